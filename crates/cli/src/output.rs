// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Output formatting for CLI commands

use clap::ValueEnum;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

/// Print output in the specified format
pub fn print<T: Serialize + std::fmt::Display>(value: &T, format: OutputFormat) {
    match format {
        OutputFormat::Text => println!("{}", value),
        OutputFormat::Json => {
            if let Ok(json) = serde_json::to_string_pretty(value) {
                println!("{}", json);
            }
        }
    }
}

/// Print one item per line; JSON output is one compact document per line
pub fn print_lines<T: Serialize + std::fmt::Display>(items: &[T], format: OutputFormat) {
    for item in items {
        match format {
            OutputFormat::Text => println!("{}", item),
            OutputFormat::Json => {
                if let Ok(json) = serde_json::to_string(item) {
                    println!("{}", json);
                }
            }
        }
    }
}

/// Payload bytes as text when they are UTF-8, otherwise hex
pub fn payload_text(payload: &[u8]) -> String {
    match std::str::from_utf8(payload) {
        Ok(text) if !text.chars().any(char::is_control) => text.to_string(),
        _ => {
            let hex: String = payload.iter().map(|b| format!("{:02x}", b)).collect();
            format!("0x{}", hex)
        }
    }
}

#[cfg(test)]
#[path = "output_tests.rs"]
mod tests;
