pub mod calendar;
pub mod db_utils;
pub mod username_index;
