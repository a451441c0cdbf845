mod craft;
mod error;
mod model;
mod options;

pub use craft::*;
pub use error::*;
pub use model::*;
pub use options::*;

#[cfg(test)]
pub mod testing;
