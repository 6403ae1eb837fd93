pub mod checkin;
pub mod core;
pub mod exports;
pub mod reports;
pub mod session;
pub mod staff;
