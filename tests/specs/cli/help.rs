//! CLI help specs
//!
//! Verify every subcommand is discoverable.

use crate::prelude::*;

#[test]
fn help_lists_subcommands() {
    let temp = Project::empty();

    let run = temp.fleetlog().args(&["--help"]).passes();
    for cmd in ["append", "read", "scan", "repair", "merge", "status"] {
        assert!(run.stdout().contains(cmd), "help missing {}", cmd);
    }
}

#[test]
fn help_shows_global_options() {
    let temp = Project::empty();

    temp.fleetlog()
        .args(&["--help"])
        .passes()
        .stdout_has("--lock-timeout")
        .stdout_has("--format");
}

#[test]
fn version_flag_prints_version() {
    let temp = Project::empty();

    temp.fleetlog()
        .args(&["--version"])
        .passes()
        .stdout_has("fleetlog");
}

#[test]
fn scan_help_mentions_quarantine_switch() {
    let temp = Project::empty();

    temp.fleetlog()
        .args(&["scan", "--help"])
        .passes()
        .stdout_has("--no-quarantine");
}
