//! Command handling module.
//!
//! Messages starting with an identity's prefix are parsed into a
//! [`ParsedCommand`] and looked up in that identity's [`CommandRegistry`].

mod context;
mod parser;
mod registry;

pub use context::{CommandContext, split_message};
pub use parser::ParsedCommand;
pub use registry::{CommandEntry, CommandHandler, CommandRegistry};
