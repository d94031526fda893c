// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

use dotstrap::{
    bootstrap::Bootstrap,
    config::Manifest,
    path::Target,
    prompt::{InquirePrompter, Prompter, Unattended},
    report::Phase,
    syscall::SystemShell,
};

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use std::{path::PathBuf, process::exit};
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Bootstrap this machine from a dotfiles repository.
#[derive(Debug, Clone, Parser)]
#[command(about, override_usage = "dotstrap [options]", version)]
struct Cli {
    /// Path to top-level of dotfiles repository.
    #[arg(short, long, value_name = "path")]
    pub root: Option<PathBuf>,

    /// Path to manifest to use instead of the repository's.
    #[arg(short, long, value_name = "path")]
    pub manifest: Option<PathBuf>,

    /// Confirm every gated operation without asking.
    #[arg(short, long, group = "answer")]
    pub yes: bool,

    /// Decline every gated operation without asking.
    #[arg(short, long, group = "answer")]
    pub no: bool,

    /// Leave out a phase of the run.
    #[arg(short, long, value_name = "phase")]
    pub skip: Vec<SkipPhase>,
}

impl Cli {
    fn run(self) -> Result<()> {
        let target = Target::resolve()?;
        let root = match self.root {
            Some(root) => root,
            None => std::env::current_dir().context("cannot determine current directory")?,
        };
        let root = root
            .canonicalize()
            .with_context(|| format!("repository {:?} does not exist", root.display()))?;
        let manifest = Manifest::load(&root, self.manifest.as_deref())?;

        let prompter: Box<dyn Prompter> = if self.yes {
            Box::new(Unattended::AssumeYes)
        } else if self.no {
            Box::new(Unattended::AssumeNo)
        } else {
            Box::new(InquirePrompter)
        };

        let mut bootstrap = Bootstrap::new(target, root, manifest, SystemShell, prompter);
        for phase in self.skip {
            bootstrap = bootstrap.skip(phase.into());
        }

        let report = bootstrap.run()?;
        info!("summary:\n{report}");
        if report.failures().next().is_some() {
            warn!("some steps failed, run dotstrap again to retry them");
        }

        Ok(())
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum SkipPhase {
    Provision,
    Toolchain,
    Link,
}

impl From<SkipPhase> for Phase {
    fn from(phase: SkipPhase) -> Self {
        match phase {
            SkipPhase::Provision => Phase::Provision,
            SkipPhase::Toolchain => Phase::Toolchain,
            SkipPhase::Link => Phase::Link,
        }
    }
}

fn main() {
    let layer = fmt::layer()
        .with_writer(std::io::stderr)
        .compact()
        .with_target(false)
        .without_time();
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap();
    tracing_subscriber::registry()
        .with(layer)
        .with(filter)
        .init();

    if let Err(error) = run() {
        error!("{error:?}");
        exit(1);
    }

    exit(0)
}

fn run() -> Result<()> {
    Cli::parse().run()
}
