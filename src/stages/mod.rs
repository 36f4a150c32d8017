//! Pipeline stages: identity, command lines and process handles.

mod command;
mod process;
mod role;

#[cfg(test)]
pub(crate) mod testing;

pub use command::CommandSpec;
pub use process::{Launcher, ProcessLauncher, StageHandle};
pub use role::{StageExit, StageRole};
