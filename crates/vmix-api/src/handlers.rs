//! Request handlers.

pub mod generate;
pub mod health;
pub mod mixer;

pub use generate::*;
pub use health::*;
pub use mixer::*;
