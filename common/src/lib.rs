pub mod candidate;
pub mod config;
pub mod date;
pub mod retry;
