//! Provider catalog - the external CCB assistants this server delegates to.
//!
//! Every provider exposes three commands (`ask`, `pend`, `ping`). The default
//! program name for each pair doubles as the short alias tool name, e.g.
//! codex + ask is both the `cask` tool and the `cask` executable.

pub mod command;

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// An external assistant reachable through its CCB command-line wrappers.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Codex,
    Gemini,
    Claude,
    Opencode,
}

impl Provider {
    pub const ALL: [Provider; 4] = [
        Provider::Codex,
        Provider::Gemini,
        Provider::Claude,
        Provider::Opencode,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Codex => "codex",
            Self::Gemini => "gemini",
            Self::Claude => "claude",
            Self::Opencode => "opencode",
        }
    }

    /// Fixed short name for a (provider, operation) pair.
    pub fn alias(&self, operation: Operation) -> &'static str {
        match (self, operation) {
            (Self::Codex, Operation::Ask) => "cask",
            (Self::Codex, Operation::Pend) => "cpend",
            (Self::Codex, Operation::Ping) => "cping",
            (Self::Gemini, Operation::Ask) => "gask",
            (Self::Gemini, Operation::Pend) => "gpend",
            (Self::Gemini, Operation::Ping) => "gping",
            (Self::Claude, Operation::Ask) => "lask",
            (Self::Claude, Operation::Pend) => "lpend",
            (Self::Claude, Operation::Ping) => "lping",
            (Self::Opencode, Operation::Ask) => "oask",
            (Self::Opencode, Operation::Pend) => "opend",
            (Self::Opencode, Operation::Ping) => "oping",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a tool call asks a provider to do.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    /// Submit a background request.
    Ask,
    /// Fetch the reply of a background request.
    Pend,
    /// Check provider availability.
    Ping,
}

impl Operation {
    pub const ALL: [Operation; 3] = [Operation::Ask, Operation::Pend, Operation::Ping];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ask => "ask",
            Self::Pend => "pend",
            Self::Ping => "ping",
        }
    }

    /// Prefix of the canonical tool name, e.g. `ccb_ask_`.
    pub fn canonical_prefix(&self) -> &'static str {
        match self {
            Self::Ask => "ccb_ask_",
            Self::Pend => "ccb_pend_",
            Self::Ping => "ccb_ping_",
        }
    }

    pub fn canonical_name(&self, provider: Provider) -> String {
        format!("{}{}", self.canonical_prefix(), provider.as_str())
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A program plus leading arguments; operation flags are appended after these.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandLine {
    pub program: String,
    pub args: Vec<String>,
}

impl CommandLine {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn with_args<I, S>(program: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    /// Build a `tokio` command with the leading arguments applied.
    pub fn to_command(&self) -> tokio::process::Command {
        let mut cmd = tokio::process::Command::new(&self.program);
        cmd.args(&self.args);
        cmd
    }
}

/// Table of provider commands. Unset entries resolve to the alias executable.
#[derive(Debug, Clone, Default)]
pub struct ProviderCommands {
    overrides: HashMap<(Provider, Operation), CommandLine>,
}

impl ProviderCommands {
    pub fn set(&mut self, provider: Provider, operation: Operation, command: CommandLine) {
        self.overrides.insert((provider, operation), command);
    }

    pub fn get(&self, provider: Provider, operation: Operation) -> CommandLine {
        self.overrides
            .get(&(provider, operation))
            .cloned()
            .unwrap_or_else(|| CommandLine::new(provider.alias(operation)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aliases_are_unique() {
        let mut seen = std::collections::HashSet::new();
        for provider in Provider::ALL {
            for operation in Operation::ALL {
                assert!(seen.insert(provider.alias(operation)));
            }
        }
        assert_eq!(seen.len(), 12);
    }

    #[test]
    fn test_default_command_is_alias() {
        let mut commands = ProviderCommands::default();
        assert_eq!(
            commands.get(Provider::Claude, Operation::Pend),
            CommandLine::new("lpend")
        );

        commands.set(
            Provider::Claude,
            Operation::Pend,
            CommandLine::with_args("sh", ["-c", "echo idle"]),
        );
        assert_eq!(commands.get(Provider::Claude, Operation::Pend).program, "sh");
        assert_eq!(
            commands.get(Provider::Codex, Operation::Pend),
            CommandLine::new("cpend")
        );
    }

    #[test]
    fn test_provider_serde_is_lowercase() {
        let json = serde_json::to_string(&Provider::Opencode).unwrap();
        assert_eq!(json, "\"opencode\"");
        let parsed: Provider = serde_json::from_str("\"gemini\"").unwrap();
        assert_eq!(parsed, Provider::Gemini);
    }
}
