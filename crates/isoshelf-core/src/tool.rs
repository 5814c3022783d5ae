//! Host executables: preflight checks and invocation.

use std::process::Command;

use isoshelf_common::error::{IsoshelfError, Result};

/// Returns whether `tool` resolves in `PATH`.
#[must_use]
pub fn is_available(tool: &str) -> bool {
    which::which(tool).is_ok()
}

/// Checks that every tool resolves in `PATH`.
///
/// # Errors
///
/// Returns [`IsoshelfError::ToolMissing`] for the first tool that does not.
pub fn ensure_available(tools: &[&str]) -> Result<()> {
    for tool in tools {
        let path = which::which(tool).map_err(|_| IsoshelfError::ToolMissing {
            tool: (*tool).to_string(),
        })?;
        tracing::debug!(tool, path = %path.display(), "tool found");
    }
    Ok(())
}

/// Runs a program to completion and returns its standard output.
///
/// # Errors
///
/// Returns [`IsoshelfError::ToolMissing`] if the program cannot be spawned
/// because it does not exist, [`IsoshelfError::Io`] for other spawn
/// failures, and [`IsoshelfError::Command`] if it exits unsuccessfully.
pub fn run(program: &str, args: &[&str]) -> Result<String> {
    tracing::debug!(program, ?args, "running host tool");
    let output = Command::new(program).args(args).output().map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            IsoshelfError::ToolMissing {
                tool: program.to_string(),
            }
        } else {
            IsoshelfError::io(program, e)
        }
    })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(IsoshelfError::Command {
            program: program.to_string(),
            message: format!("{}: {}", output.status, stderr.trim()),
        });
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}
