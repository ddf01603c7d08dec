//! Command authorization policy.
//!
//! A command may reach the remote host only if it starts with an allow-listed
//! prefix **and** contains none of the deny patterns. The deny check always
//! runs and always wins: `git log && rm -rf /` starts with an allowed prefix
//! but is rejected because of `&&`.
//!
//! Matching is plain, case-sensitive substring matching. The prefix direction
//! is request-starts-with-entry, so `git` alone does not match `git status`.
//!
//! # Policy Tables
//!
//! Tables are data, built once at startup and shared behind an `Arc`. The
//! built-in tables can be replaced with a JSON file named by `SSH_POLICY_FILE`:
//!
//! ```json
//! {
//!   "allowed_commands": ["docker ps", "git log"],
//!   "blocked_patterns": [">", "|", ";", "rm "]
//! }
//! ```

use std::env;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::mcp::config::ConfigError;

/// Environment variable naming a JSON policy file
pub(crate) const POLICY_FILE_ENV_VAR: &str = "SSH_POLICY_FILE";

/// Read-only command prefixes permitted by default.
pub const DEFAULT_ALLOWED_COMMANDS: &[&str] = &[
    "ls",
    "dir",
    "cat",
    "head",
    "tail",
    "grep",
    "pwd",
    "whoami",
    "date",
    "uptime",
    "free",
    "df",
    "docker ps",
    "docker logs",
    "docker inspect",
    "docker images",
    "git status",
    "git log",
    "git diff",
];

/// Patterns that veto a command even when its prefix is allowed.
///
/// Shell composition (redirection, piping, chaining, substitution, line
/// breaks) comes first, then dangerous verbs.
pub const DEFAULT_BLOCKED_PATTERNS: &[&str] = &[
    ">>", ">", "<", "|", ";", "&&", "&", "$(", "`", "\n", "\r", "rm ", "mv ", "cp ", "kill ",
    "sudo ", "nano ", "vim ",
];

/// The allow-list and deny-list a [`PolicyEngine`] evaluates against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct PolicyTables {
    /// Ordered command prefixes; a command must start with one of them.
    pub allowed_commands: Vec<String>,
    /// Substrings that reject a command wherever they appear.
    pub blocked_patterns: Vec<String>,
}

impl Default for PolicyTables {
    fn default() -> Self {
        Self {
            allowed_commands: DEFAULT_ALLOWED_COMMANDS
                .iter()
                .map(|s| s.to_string())
                .collect(),
            blocked_patterns: DEFAULT_BLOCKED_PATTERNS
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

impl PolicyTables {
    /// Build tables from explicit lists, rejecting empty entries.
    pub fn new(
        allowed_commands: Vec<String>,
        blocked_patterns: Vec<String>,
    ) -> Result<Self, ConfigError> {
        let tables = Self {
            allowed_commands,
            blocked_patterns,
        };
        tables.validate()?;
        Ok(tables)
    }

    /// Load from `SSH_POLICY_FILE` if set, otherwise use the built-in tables.
    pub fn load() -> Result<Self, ConfigError> {
        match env::var(POLICY_FILE_ENV_VAR) {
            Ok(path) if !path.trim().is_empty() => Self::from_file(path.trim()),
            _ => {
                info!("Using built-in command policy");
                Ok(Self::default())
            }
        }
    }

    /// Load tables from a JSON file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let policy_error = |message: String| ConfigError::PolicyFile {
            path: path.display().to_string(),
            message,
        };

        let raw = fs::read_to_string(path).map_err(|e| policy_error(e.to_string()))?;
        let parsed: PolicyTables =
            serde_json::from_str(&raw).map_err(|e| policy_error(e.to_string()))?;
        let tables = Self::new(parsed.allowed_commands, parsed.blocked_patterns)?;

        if tables.allowed_commands.is_empty() {
            warn!(
                "Policy file {} has an empty allow-list; every command will be denied",
                path.display()
            );
        }
        info!(
            "Loaded command policy from {} ({} allowed prefixes, {} blocked patterns)",
            path.display(),
            tables.allowed_commands.len(),
            tables.blocked_patterns.len()
        );
        Ok(tables)
    }

    /// An empty prefix would allow everything and an empty pattern would block
    /// everything, so neither is accepted.
    fn validate(&self) -> Result<(), ConfigError> {
        if let Some(index) = self.allowed_commands.iter().position(|e| e.is_empty()) {
            return Err(ConfigError::EmptyPolicyEntry {
                table: "allowed_commands",
                index,
            });
        }
        if let Some(index) = self.blocked_patterns.iter().position(|e| e.is_empty()) {
            return Err(ConfigError::EmptyPolicyEntry {
                table: "blocked_patterns",
                index,
            });
        }
        Ok(())
    }
}

/// Verdict for a single command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct PolicyDecision {
    pub allowed: bool,
    /// Why the command was denied; `None` when allowed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// Allow-list entry the command started with, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub matched_prefix: Option<String>,
    /// First deny pattern found in the command, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blocked_pattern: Option<String>,
}

impl PolicyDecision {
    fn deny(reason: impl Into<String>) -> Self {
        Self {
            allowed: false,
            reason: Some(reason.into()),
            matched_prefix: None,
            blocked_pattern: None,
        }
    }
}

/// Pure decision function over a command string and the policy tables.
#[derive(Debug, Clone)]
pub struct PolicyEngine {
    tables: Arc<PolicyTables>,
}

impl PolicyEngine {
    pub fn new(tables: Arc<PolicyTables>) -> Self {
        Self { tables }
    }

    pub fn tables(&self) -> &PolicyTables {
        &self.tables
    }

    /// Decide whether `command` may run. No I/O, no side effects.
    pub fn validate(&self, command: &str) -> PolicyDecision {
        if command.trim().is_empty() {
            return PolicyDecision::deny("empty command");
        }

        let matched_prefix = self
            .tables
            .allowed_commands
            .iter()
            .find(|prefix| command.starts_with(prefix.as_str()))
            .cloned();

        // Runs whether or not a prefix matched
        let blocked_pattern = self
            .tables
            .blocked_patterns
            .iter()
            .find(|pattern| command.contains(pattern.as_str()))
            .cloned();

        let reason = match (&matched_prefix, &blocked_pattern) {
            (_, Some(pattern)) => Some(format!(
                "Command contains blocked pattern: '{}'",
                pattern.escape_debug()
            )),
            (None, None) => Some(format!(
                "Command '{}' is not in allow-list",
                base_command(command)
            )),
            (Some(_), None) => None,
        };

        PolicyDecision {
            allowed: reason.is_none(),
            reason,
            matched_prefix,
            blocked_pattern,
        }
    }
}

/// First whitespace-separated word, for messages.
fn base_command(command: &str) -> &str {
    command.split_whitespace().next().unwrap_or_default()
}
