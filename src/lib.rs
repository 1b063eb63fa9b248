pub mod error;
pub mod player;
pub mod stream;
pub mod utils;

pub use error::{Error, Result};
