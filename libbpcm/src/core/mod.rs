pub mod error;
pub mod types;

pub use error::{DecodeError, Error};
pub use types::*;
