//! A small Logo dialect for driving turtles.
//!
//! Programs are parsed into [`typ::Expr`]s and evaluated asynchronously, so that a host function
//! (like the one behind `readword`) can suspend the program while it waits for the user.

pub mod parse;
pub mod proc;
pub mod runtime;
pub mod typ;

pub use parse::ParseFailure;
pub use runtime::LogoRuntime;
pub use typ::EvalError;
