//! Command-line driver for the flag engine: list, edit and materialize the
//! stored selection of one actor.

pub mod args;
pub mod commands;

pub use args::{Cli, Command};
pub use commands::{execute, load, load_registry};
