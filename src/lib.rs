pub mod bytecode;
pub mod engine;
pub mod error;
pub mod modules;
pub mod runtime;
pub mod scope;
pub mod stdlib;
pub mod syntax;

pub use engine::{Compiled, Engine};
pub use error::Error;
pub use scope::Scope;
