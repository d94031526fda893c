// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Package provisioning.
//!
//! Registers extra package sources, refreshes the package index, and
//! installs each listed package through the system package manager. All
//! steps run with superuser privileges, escalating through sudo when the
//! process does not have them already.
//!
//! Nothing here is fatal. A package that fails to install is recorded and
//! the remaining packages are still attempted.

use crate::{
    config::PackageSettings,
    path::Target,
    report::{Phase, Report, StepOutcome},
    syscall::{Invocation, Syscall},
};

use tracing::{debug, instrument};

/// Register sources, refresh index, and install packages.
#[instrument(skip_all, level = "debug")]
pub fn provision(
    target: &Target,
    packages: &PackageSettings,
    syscall: &mut dyn Syscall,
    report: &mut Report,
) {
    for source in &packages.sources {
        let step = format!("source {}", source.last().map(String::as_str).unwrap_or_default());
        let outcome = run_privileged(target, source, syscall);
        report.record(Phase::Provision, step, outcome);
    }

    if !packages.update.is_empty() {
        let outcome = run_privileged(target, &packages.update, syscall);
        report.record(Phase::Provision, "refresh package index", outcome);
    }

    for name in &packages.names {
        let argv = packages.install.iter().chain(Some(name));
        let outcome = run_privileged(target, argv, syscall);
        report.record(Phase::Provision, format!("install {name}"), outcome);
    }
}

fn run_privileged<'a>(
    target: &Target,
    argv: impl IntoIterator<Item = &'a String>,
    syscall: &mut dyn Syscall,
) -> StepOutcome {
    let invocation = match Invocation::from_argv(argv) {
        Ok(invocation) => invocation.privileged(target),
        Err(err) => return StepOutcome::failed(err),
    };

    match syscall.run(&invocation) {
        Ok(output) => {
            if !output.is_empty() {
                debug!("{output}");
            }
            StepOutcome::Done
        }
        Err(err) => StepOutcome::failed(err),
    }
}
