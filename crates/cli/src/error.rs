// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! User-friendly error display with context and suggestions.
//!
//! Errors are rendered as:
//! - What went wrong (message)
//! - Why it might have happened (context)
//! - How to fix it (suggestions)

use fleetlog_core::LogError;
use std::fmt;

/// Error with context and recovery suggestions for display.
#[derive(Debug)]
pub struct CliError {
    /// What went wrong
    pub message: String,
    /// Why it might have happened
    pub context: Vec<String>,
    /// How to fix it
    pub suggestions: Vec<String>,
}

impl CliError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            context: Vec::new(),
            suggestions: Vec::new(),
        }
    }

    pub fn with_context(mut self, ctx: impl Into<String>) -> Self {
        self.context.push(ctx.into());
        self
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestions.push(suggestion.into());
        self
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "error: {}", self.message)?;

        if !self.context.is_empty() {
            writeln!(f)?;
            for ctx in &self.context {
                writeln!(f, "  -> {}", ctx)?;
            }
        }

        if !self.suggestions.is_empty() {
            writeln!(f)?;
            writeln!(f, "suggestions:")?;
            for (i, suggestion) in self.suggestions.iter().enumerate() {
                writeln!(f, "  {}. {}", i + 1, suggestion)?;
            }
        }

        Ok(())
    }
}

/// Render any command failure, adding guidance for log errors we recognize
pub fn describe(err: &anyhow::Error) -> CliError {
    let Some(log_err) = err.chain().find_map(|e| e.downcast_ref::<LogError>()) else {
        let mut out = CliError::new(err.to_string());
        for cause in err.chain().skip(1) {
            out = out.with_context(cause.to_string());
        }
        return out;
    };

    match log_err {
        LogError::LockTimeout {
            waited,
            holder,
            holder_alive,
            ..
        } => {
            let mut out = CliError::new(format!(
                "log is busy: lock not acquired within {}ms",
                waited.as_millis()
            ));
            if let Some(holder) = holder {
                out = out.with_context(format!(
                    "held by pid {} on {}",
                    holder.pid, holder.host
                ));
            }
            out = match holder_alive {
                Some(false) => out
                    .with_context("the holder is gone; its lock will be reclaimed")
                    .with_suggestion("Retry the command"),
                _ => out.with_suggestion("Retry once the current writer finishes"),
            };
            out.with_suggestion("Wait longer with: fleetlog --lock-timeout 30s ...")
        }
        LogError::CompactionBlocked { damaged_spans } => {
            CliError::new(format!("{} damaged span(s) need attention", damaged_spans))
                .with_suggestion("Inspect the damage: fleetlog scan --dir <DIR>")
                .with_suggestion("Rebuild from verified records: fleetlog repair --dir <DIR>")
        }
        LogError::PayloadTooLarge { len, max } => {
            CliError::new(format!("payload of {} bytes is too large", len))
                .with_context(format!("the configured limit is {} bytes", max))
        }
        LogError::InvalidOrigin(origin) => {
            CliError::new(format!("invalid origin id {:?}", origin)).with_context(
                "origin ids are 1-128 bytes of [A-Za-z0-9._-] and must not start with '.'",
            )
        }
        other => CliError::new(other.to_string()),
    }
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
