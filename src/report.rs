// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Run summary.
//!
//! Every step of a bootstrap run ends in a [`StepOutcome`]. External
//! failures never stop the run, so the [`Report`] is where they surface:
//! it collects each outcome and renders a summary once all phases are done.

use std::fmt::{Display, Formatter, Result as FmtResult};
use tracing::{error, info};

/// Phase of a bootstrap run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    /// Package sources and packages.
    Provision,

    /// Tools, font, plugins, and login shell.
    Toolchain,

    /// Symlinks into home directory.
    Link,
}

impl Display for Phase {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        fmt.pad(match self {
            Self::Provision => "provision",
            Self::Toolchain => "toolchain",
            Self::Link => "link",
        })
    }
}

/// Result of one step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    /// Step changed something.
    Done,

    /// Step had nothing to do, or was declined.
    Skipped(String),

    /// Step failed without stopping the run.
    Failed(String),
}

impl StepOutcome {
    pub fn skipped(reason: impl Into<String>) -> Self {
        Self::Skipped(reason.into())
    }

    pub fn failed(reason: impl ToString) -> Self {
        Self::Failed(reason.to_string())
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed(_))
    }
}

impl Display for StepOutcome {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        match self {
            Self::Done => fmt.write_str("done"),
            Self::Skipped(reason) => write!(fmt, "skipped ({reason})"),
            Self::Failed(reason) => write!(fmt, "failed ({reason})"),
        }
    }
}

/// Outcome of a named step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepRecord {
    pub phase: Phase,
    pub step: String,
    pub outcome: StepOutcome,
}

/// Collected step outcomes of a run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Report {
    records: Vec<StepRecord>,
}

impl Report {
    /// Construct new empty report.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record outcome of a step, and log it.
    pub fn record(&mut self, phase: Phase, step: impl Into<String>, outcome: StepOutcome) {
        let step = step.into();
        match &outcome {
            StepOutcome::Failed(reason) => error!("{phase}: {step}: {reason}"),
            _ => info!("{phase}: {step}: {outcome}"),
        }

        self.records.push(StepRecord {
            phase,
            step,
            outcome,
        });
    }

    /// All recorded steps in order.
    pub fn records(&self) -> &[StepRecord] {
        self.records.as_slice()
    }

    /// Outcome of first step with given name.
    pub fn outcome(&self, step: impl AsRef<str>) -> Option<&StepOutcome> {
        self.records
            .iter()
            .find(|record| record.step == step.as_ref())
            .map(|record| &record.outcome)
    }

    /// Steps that failed.
    pub fn failures(&self) -> impl Iterator<Item = &StepRecord> {
        self.records
            .iter()
            .filter(|record| record.outcome.is_failed())
    }
}

impl Display for Report {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        let width = self
            .records
            .iter()
            .map(|record| record.step.len())
            .max()
            .unwrap_or(0);

        let (mut done, mut skipped, mut failed) = (0, 0, 0);
        for record in &self.records {
            match record.outcome {
                StepOutcome::Done => done += 1,
                StepOutcome::Skipped(_) => skipped += 1,
                StepOutcome::Failed(_) => failed += 1,
            }

            writeln!(
                fmt,
                "{:<9}  {:<width$}  {}",
                record.phase, record.step, record.outcome
            )?;
        }

        write!(fmt, "{done} done, {skipped} skipped, {failed} failed")
    }
}
