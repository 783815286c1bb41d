pub mod availability;
pub mod booking;
pub mod gym;
pub mod health;
pub mod recurring;
