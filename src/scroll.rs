pub mod region;
pub mod signal;
