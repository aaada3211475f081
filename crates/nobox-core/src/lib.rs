pub mod archive;
pub mod config;
pub mod error;
pub mod install;
pub mod paths;
pub mod pipeline;
pub mod probe;
pub mod process;
pub mod prompt;
pub mod step;
pub mod vcs;

#[cfg(test)]
mod testing;

pub use error::{NoboxError, Result};
