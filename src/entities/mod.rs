pub mod booking;
pub mod carpool;
pub mod rider;
