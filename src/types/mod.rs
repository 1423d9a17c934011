//! Analytics Types
//!
//! Configuration, token and historical data definitions.

pub mod config;
pub mod hist;
pub mod token;

pub use config::*;
pub use hist::*;
pub use token::*;
