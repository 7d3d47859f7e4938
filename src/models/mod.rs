pub mod gender;
pub mod inbox_message;
pub mod preference;
pub mod user;
pub mod user_status;
