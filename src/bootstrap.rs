// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Bootstrap run orchestration.
//!
//! A __bootstrap run__ takes a machine from a fresh install to a usable
//! environment in three phases, executed strictly in sequence:
//!
//! 1. __Provision__: register package sources, and install packages through
//!    the system package manager.
//! 2. __Toolchain__: install tools, the font, and shell plugins into the
//!    target home directory, then offer to switch the login shell.
//! 3. __Link__: symlink tracked files from the repository into the target
//!    home directory.
//!
//! # Best Effort
//!
//! Package managers, download tools, and remotes fail for all sorts of
//! reasons that have nothing to do with dotstrap. Such failures are logged
//! and recorded in the run's [`Report`], then the run continues. Every step
//! checks whether its work is already done, so the way to retry is to run
//! dotstrap again.
//!
//! Only internal errors abort a run: malformed manifest entries, prompts
//! that cannot be answered, or a login shell that cannot be found after the
//! user asked to switch to it.

pub mod fetch;
pub mod identity;
pub mod link;
pub mod provision;
pub mod toolchain;

use crate::{
    bootstrap::{
        fetch::{Git2Fetcher, PluginFetch},
        link::{LinkError, Linker},
        toolchain::ToolchainError,
    },
    config::Manifest,
    path::Target,
    prompt::{InquirePrompter, Prompter},
    report::{Phase, Report},
    syscall::{Syscall, SystemShell},
};

use std::{collections::HashSet, path::PathBuf};
use tracing::{info, instrument};

/// A single bootstrap run.
///
/// Owns everything a run needs: the resolved target, the repository root,
/// the manifest, and the capabilities used to reach the outside world.
#[derive(Debug)]
pub struct Bootstrap<S = SystemShell, P = InquirePrompter, F = Git2Fetcher>
where
    S: Syscall,
    P: Prompter,
    F: PluginFetch,
{
    target: Target,
    root: PathBuf,
    manifest: Manifest,
    syscall: S,
    prompter: P,
    fetcher: F,
    skip: HashSet<Phase>,
}

impl<S, P> Bootstrap<S, P, Git2Fetcher>
where
    S: Syscall,
    P: Prompter,
{
    /// Construct new bootstrap run, cloning plugins through libgit2.
    pub fn new(
        target: Target,
        root: impl Into<PathBuf>,
        manifest: Manifest,
        syscall: S,
        prompter: P,
    ) -> Self {
        Self::with_fetcher(target, root, manifest, syscall, prompter, Git2Fetcher)
    }
}

impl<S, P, F> Bootstrap<S, P, F>
where
    S: Syscall,
    P: Prompter,
    F: PluginFetch,
{
    /// Construct new bootstrap run with custom plugin fetcher.
    pub fn with_fetcher(
        target: Target,
        root: impl Into<PathBuf>,
        manifest: Manifest,
        syscall: S,
        prompter: P,
        fetcher: F,
    ) -> Self {
        Self {
            target,
            root: root.into(),
            manifest,
            syscall,
            prompter,
            fetcher,
            skip: HashSet::new(),
        }
    }

    /// Leave out phase from run.
    pub fn skip(mut self, phase: Phase) -> Self {
        self.skip.insert(phase);
        self
    }

    /// Execute all phases that are not skipped, in order.
    ///
    /// # Errors
    ///
    /// - Return [`BootstrapError::Toolchain`] if toolchain phase hits an
    ///   internal error.
    /// - Return [`BootstrapError::Link`] if link phase hits an internal
    ///   error.
    #[instrument(skip(self), fields(user = self.target.user()), level = "debug")]
    pub fn run(mut self) -> Result<Report> {
        let mut report = Report::new();

        if self.enabled(Phase::Provision) {
            info!("provision packages");
            provision::provision(
                &self.target,
                &self.manifest.packages,
                &mut self.syscall,
                &mut report,
            );
        }

        if self.enabled(Phase::Toolchain) {
            info!("install toolchain");
            toolchain::install_tools(
                &self.target,
                &self.manifest.tools,
                &mut self.syscall,
                &mut report,
            )?;
            toolchain::install_font(
                &self.target,
                self.manifest.font.as_ref(),
                &mut self.syscall,
                &mut report,
            )?;
            toolchain::clone_plugins(
                &self.target,
                &self.manifest.plugins,
                &mut self.fetcher,
                &mut report,
            )?;
            toolchain::change_login_shell(
                &self.target,
                self.manifest.shell.as_ref(),
                &mut self.syscall,
                &mut self.prompter,
                &mut report,
            )?;
        }

        if self.enabled(Phase::Link) {
            info!("link files from {}", self.root.display());
            Linker::new(&self.target, &self.root).link_all(
                &self.manifest.links,
                &mut self.prompter,
                &mut report,
            )?;
        }

        Ok(report)
    }

    fn enabled(&self, phase: Phase) -> bool {
        !self.skip.contains(&phase)
    }
}

/// Bootstrap run error types.
#[derive(Debug, thiserror::Error)]
pub enum BootstrapError {
    /// Toolchain phase hits internal error.
    #[error(transparent)]
    Toolchain(#[from] ToolchainError),

    /// Link phase hits internal error.
    #[error(transparent)]
    Link(#[from] LinkError),
}

/// Friendly result alias :3
type Result<T, E = BootstrapError> = std::result::Result<T, E>;
