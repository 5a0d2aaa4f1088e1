pub mod admin;
pub mod admin_correction;
pub mod attendance;
pub mod correction;
pub mod views;
