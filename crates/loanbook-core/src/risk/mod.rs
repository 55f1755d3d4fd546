pub mod config;
pub mod dpd;
mod parallel;
pub mod portfolio;
pub mod status;
