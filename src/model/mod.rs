pub mod home_office;
pub mod permission;
pub mod role;
pub mod status;
pub mod time_entry;
pub mod user;
pub mod vacation;
