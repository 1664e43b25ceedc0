pub mod audit;
pub mod config;
pub mod error;
pub mod metadata;
pub mod naming;
pub mod node;
pub mod placement;

pub use error::{Result, ScatterError};
