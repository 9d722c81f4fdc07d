//! Domain models for the glyco-cds system.

mod audit;
mod conditions;
mod glucose;
mod labs;
mod patient;
mod recommendation;

pub use audit::*;
pub use conditions::*;
pub use glucose::*;
pub use labs::*;
pub use patient::*;
pub use recommendation::*;
