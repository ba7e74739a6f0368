pub mod builtins;
pub mod context;
mod contracts;
pub mod environment;
pub mod error;
pub mod interpreter;
mod loops;
mod structs;
pub mod typecheck;
pub mod types;
pub mod value;

pub use interpreter::{Flow, Interpreter};
