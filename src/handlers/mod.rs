pub mod ride;
pub mod rider;
