//! Line-oriented operator prompts.
//!
//! Prompts go to the writer (stderr in practice) so stdout stays clean for
//! tables. End of input is treated as the most conservative answer.

use std::io::{self, BufRead, Write};

use isoshelf_common::types::UnmountDecision;
use isoshelf_runtime::guard::UsageReport;

use crate::output;

/// Reads answers from `input` and writes questions to `output`.
pub struct Prompter<R, W> {
    input: R,
    output: W,
}

impl Prompter<io::StdinLock<'static>, io::Stderr> {
    /// Prompts on the terminal.
    pub fn terminal() -> Self {
        Self::new(io::stdin().lock(), io::stderr())
    }
}

impl<R: BufRead, W: Write> Prompter<R, W> {
    /// Wraps a reader and a writer.
    pub const fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    /// Asks a question and returns the trimmed answer, `None` at end of input.
    ///
    /// # Errors
    ///
    /// Returns an error if reading or writing fails.
    pub fn ask(&mut self, question: &str) -> io::Result<Option<String>> {
        write!(self.output, "{question}: ")?;
        self.output.flush()?;
        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            return Ok(None);
        }
        Ok(Some(line.trim().to_string()))
    }

    /// Asks for a value that must be present.
    ///
    /// # Errors
    ///
    /// Returns an error at end of input or if reading fails.
    pub fn required(&mut self, question: &str) -> anyhow::Result<String> {
        self.ask(question)?
            .ok_or_else(|| anyhow::anyhow!("input closed while asking for {question}"))
    }

    /// Shows the current value and returns a replacement, or `None` to keep it.
    ///
    /// # Errors
    ///
    /// Returns an error if reading or writing fails.
    pub fn replacement(&mut self, question: &str, current: &str) -> io::Result<Option<String>> {
        let answer = self.ask(&format!("{question} [{current}]"))?;
        Ok(answer.filter(|value| !value.is_empty() && value != current))
    }

    /// Asks a yes/no question. Anything but `y`/`yes` is no.
    ///
    /// # Errors
    ///
    /// Returns an error if reading or writing fails.
    pub fn confirm(&mut self, question: &str) -> io::Result<bool> {
        let answer = self.ask(&format!("{question} [y/N]"))?;
        Ok(answer.is_some_and(|a| matches!(a.to_ascii_lowercase().as_str(), "y" | "yes")))
    }

    /// Shows what is using `name` and asks how to proceed.
    ///
    /// Unreadable or unrecognized answers abort.
    pub fn decision(&mut self, name: &str, usage: &UsageReport) -> UnmountDecision {
        let _ = writeln!(
            self.output,
            "\n  {}{name} is in use:{}",
            output::YELLOW,
            output::RESET
        );
        for line in output::usage_lines(usage) {
            let _ = writeln!(self.output, "    {line}");
        }
        let _ = writeln!(self.output, "\n  1) Abort (default)");
        let _ = writeln!(self.output, "  2) Eject media from VMs, then unmount");
        let _ = writeln!(self.output, "  3) Unmount anyway");
        match self.ask("  Choice") {
            Ok(Some(answer)) => UnmountDecision::from_operator_input(&answer),
            Ok(None) | Err(_) => UnmountDecision::Abort,
        }
    }
}
