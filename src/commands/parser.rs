//! Command line parsing.

use std::fmt;

/// A message split into command name and arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedCommand {
    /// Lowercased command name without the prefix.
    pub name: String,
    /// Everything after the name, trimmed.
    pub raw_args: String,
}

impl ParsedCommand {
    /// Parses a command from a message text.
    ///
    /// Returns `None` if the message does not start with `prefix` or carries
    /// no command name.
    #[must_use]
    pub fn parse(text: &str, prefix: &str) -> Option<Self> {
        let text = text.trim();

        let after_prefix = text.strip_prefix(prefix)?;

        // The name must follow the prefix directly: ". ping" is not a command
        if after_prefix.starts_with(char::is_whitespace) {
            return None;
        }

        let (name, args) = match after_prefix.split_once(char::is_whitespace) {
            Some((name, args)) => (name, args.trim()),
            None => (after_prefix, ""),
        };

        // Bot commands in groups arrive as `/start@SomeBot`
        let name = name.split_once('@').map_or(name, |(name, _)| name);
        if name.is_empty() {
            return None;
        }

        Some(Self {
            name: name.to_lowercase(),
            raw_args: args.to_owned(),
        })
    }

    /// Whitespace-separated arguments.
    pub fn args(&self) -> impl Iterator<Item = &str> {
        self.raw_args.split_whitespace()
    }

    /// The first argument, if any.
    #[must_use]
    pub fn first_arg(&self) -> Option<&str> {
        self.args().next()
    }

    /// Splits the arguments into the first word and the trimmed rest.
    #[must_use]
    pub fn split_first(&self) -> Option<(&str, &str)> {
        if self.raw_args.is_empty() {
            return None;
        }
        Some(
            self.raw_args
                .split_once(char::is_whitespace)
                .map_or((self.raw_args.as_str(), ""), |(first, rest)| (first, rest.trim())),
        )
    }
}

impl fmt::Display for ParsedCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.raw_args.is_empty() {
            write!(f, "{}", self.name)
        } else {
            write!(f, "{} {}", self.name, self.raw_args)
        }
    }
}
