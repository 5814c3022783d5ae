//! `isoshelf unmount` — Safely unmount an item and deregister it.

use clap::{Args, ValueEnum};
use isoshelf_common::types::UnmountDecision;
use isoshelf_runtime::controller::Controller;
use isoshelf_runtime::guard::UsageReport;
use isoshelf_runtime::lifecycle::UnmountOutcome;

use crate::output;
use crate::prompt::Prompter;

/// What to do when the storage is in use, for non-interactive runs.
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum DecisionArg {
    /// Leave everything as it is.
    Abort,
    /// Eject the storage's media from every VM, then unmount.
    Remediate,
    /// Unmount without ejecting anything.
    Force,
}

impl From<DecisionArg> for UnmountDecision {
    fn from(arg: DecisionArg) -> Self {
        match arg {
            DecisionArg::Abort => Self::Abort,
            DecisionArg::Remediate => Self::RemediateAndProceed,
            DecisionArg::Force => Self::ForceProceed,
        }
    }
}

/// Arguments for the `unmount` command.
#[derive(Args, Debug)]
pub struct UnmountArgs {
    /// Item as `<category>/<item>` or storage name.
    pub item: String,

    /// Answer to use if the storage is in use. Prompts when omitted.
    #[arg(long, value_enum)]
    pub decision: Option<DecisionArg>,
}

/// Builds the decision callback: a preset answer, or a terminal prompt.
pub fn decider(preset: Option<DecisionArg>) -> impl FnMut(&str, &UsageReport) -> UnmountDecision {
    move |name, usage| match preset {
        Some(arg) => {
            output::print(&output::usage_lines(usage));
            UnmountDecision::from(arg)
        }
        None => Prompter::terminal().decision(name, usage),
    }
}

/// Prints an unmount outcome. Returns an error for an abort so one-shot
/// runs exit non-zero.
///
/// # Errors
///
/// Returns an error if the operator aborted.
pub fn report(name: &str, outcome: &UnmountOutcome) -> anyhow::Result<()> {
    match outcome {
        UnmountOutcome::Completed(report) => {
            output::print(&output::unmount_lines(name, report));
            Ok(())
        }
        UnmountOutcome::Aborted { .. } => {
            anyhow::bail!("unmount of {name} aborted; mount and registry left unchanged")
        }
    }
}

/// Fails unless a delete released the item, so the caller never reports a
/// kept record as deleted.
///
/// # Errors
///
/// Returns an error if the item was unmounted but is still registered.
pub fn ensure_released(name: &str, outcome: &UnmountOutcome) -> anyhow::Result<()> {
    if outcome.released() {
        Ok(())
    } else {
        anyhow::bail!("{name} kept in the catalog: unmounted but still registered; delete again to retry")
    }
}

/// Executes the `unmount` command.
///
/// # Errors
///
/// Returns an error if the item is unknown, the operator aborts, or the
/// unmount fails.
pub fn execute(controller: &Controller, args: &UnmountArgs) -> anyhow::Result<()> {
    let (cat, id) = super::resolve_item(controller.catalog(), &args.item)?;
    let name = controller.catalog().item(cat, id)?.name().to_string();
    let mut decide = decider(args.decision);
    let outcome = controller.unmount_item(cat, id, |usage| decide(&name, usage))?;
    report(&name, &outcome)
}
