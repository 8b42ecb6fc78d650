//! Configuration system for tandem

pub mod defaults;
mod loader;
mod run;
mod types;
pub mod validation;

pub use defaults::*;
pub use loader::*;
pub use run::*;
pub use types::*;
pub use validation::*;
