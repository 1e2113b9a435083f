pub mod encoder;
pub mod keys;
pub mod pipeline;
#[cfg(test)]
pub mod testing;

pub use pipeline::{EmptyReason, Outcome, TimelapseBuilder, TimelapseError};
