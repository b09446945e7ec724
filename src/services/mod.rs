pub mod admission;
pub mod availability;
pub mod locks;
pub mod schedule;
pub mod slots;
pub mod status;
