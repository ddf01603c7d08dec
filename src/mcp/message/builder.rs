//! Builder patterns for constructing tool response text.

use crate::mcp::policy::PolicyTables;
use crate::mcp::types::ExecutionResult;

/// Builder for the text reported after a remote command finishes.
///
/// # Example
///
/// ```ignore
/// let text = ExecutionReportBuilder::new(&result)
///     .with_output_limit(1024 * 1024)
///     .build();
/// ```
pub struct ExecutionReportBuilder<'a> {
    result: &'a ExecutionResult,
    output_limit: Option<usize>,
}

impl<'a> ExecutionReportBuilder<'a> {
    pub fn new(result: &'a ExecutionResult) -> Self {
        Self {
            result,
            output_limit: None,
        }
    }

    /// Mention the cap in truncation notices.
    pub fn with_output_limit(mut self, limit: usize) -> Self {
        self.output_limit = Some(limit);
        self
    }

    /// Build the message string.
    ///
    /// Layout: `Output:` section, `Errors:` section (`(none)` when empty), the
    /// exit code, and the terminating signal when there was one.
    pub fn build(&self) -> String {
        let stdout = self.result.stdout_lossy();
        let stderr = self.result.stderr_lossy();

        let mut lines = vec![
            "Output:".to_string(),
            stdout,
            String::new(),
            "Errors:".to_string(),
            if stderr.is_empty() {
                "(none)".to_string()
            } else {
                stderr
            },
            String::new(),
        ];

        if self.result.exit_code >= 0 {
            lines.push(format!("Exit code: {}", self.result.exit_code));
        } else {
            lines.push("Exit code: unknown".to_string());
        }
        if let Some(ref signal) = self.result.signal {
            lines.push(format!("Signal: {}", signal));
        }
        if self.result.stdout_truncated {
            lines.push(self.truncation_notice("stdout"));
        }
        if self.result.stderr_truncated {
            lines.push(self.truncation_notice("stderr"));
        }

        lines.join("\n")
    }

    fn truncation_notice(&self, stream: &str) -> String {
        match self.output_limit {
            Some(limit) => format!("[{} truncated after {} bytes]", stream, limit),
            None => format!("[{} truncated]", stream),
        }
    }
}

/// Builder for the policy introspection listing.
pub struct PolicyListingBuilder<'a> {
    tables: &'a PolicyTables,
}

impl<'a> PolicyListingBuilder<'a> {
    pub fn new(tables: &'a PolicyTables) -> Self {
        Self { tables }
    }

    /// Build the message string. Patterns are shown escaped and quoted so
    /// whitespace and control characters stay visible.
    pub fn build(&self) -> String {
        let allowed = if self.tables.allowed_commands.is_empty() {
            "(none: every command is denied)".to_string()
        } else {
            self.tables.allowed_commands.join(", ")
        };

        let blocked = if self.tables.blocked_patterns.is_empty() {
            "(none)".to_string()
        } else {
            self.tables
                .blocked_patterns
                .iter()
                .map(|p| format!("'{}'", p.escape_debug()))
                .collect::<Vec<_>>()
                .join(", ")
        };

        [
            "Allowed:".to_string(),
            allowed,
            String::new(),
            "Blocked Patterns:".to_string(),
            blocked,
            String::new(),
            "A command must start with an allowed prefix and must not contain any blocked pattern."
                .to_string(),
        ]
        .join("\n")
    }
}

/// Truncate a command string for log lines, respecting char boundaries.
pub fn truncate_command(command: &str, max_len: usize) -> String {
    if command.chars().count() > max_len {
        let kept: String = command.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    } else {
        command.to_string()
    }
}
