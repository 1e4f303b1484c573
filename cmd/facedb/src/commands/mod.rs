//! CLI commands module.

mod group;
mod identity;
mod unknown;
mod util;

pub use group::GroupCommand;
pub use identity::{
    AddCommand, DeleteCommand, IdentifyCommand, InfoCommand, ListCommand, RenameCommand,
};
pub use unknown::UnknownCommand;

pub(crate) use util::*;
