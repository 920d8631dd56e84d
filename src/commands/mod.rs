pub mod chrome;
pub mod fill;
