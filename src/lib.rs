pub mod config;
pub mod error;
pub mod invokers;
pub mod logic;
pub mod models;

pub use error::{PlantDiagError, Result};
