pub mod common;
pub mod home_office;
pub mod permission;
pub mod time_entry;
pub mod users;
pub mod vacation;
