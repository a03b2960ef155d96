#![forbid(unsafe_code)]
#![doc = "Common algorithm identifiers and error types for the seclink TLS stack."]

pub mod algorithm;
pub mod error;

pub use algorithm::*;
pub use error::*;
