// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Idempotent symlink deployment.
//!
//! The linker makes each destination below the target home directory a
//! symlink to its source in the repository. Missing parent directories are
//! created, and whatever file or symlink sat at the destination before is
//! replaced without backup. Running the linker again over the same mappings
//! leaves the file system exactly as the first run left it.
//!
//! Real directories at a destination are never removed. Those mappings fail
//! without stopping the run.

use crate::{
    bootstrap::identity::{self, IdentityError},
    config::{ConfigError, Gate, LinkMapping},
    path::{Owner, Target},
    prompt::{PromptError, Prompter},
    report::{Phase, Report, StepOutcome},
};

use std::{
    fs::{read_link, remove_file, symlink_metadata},
    io::ErrorKind,
    os::unix::fs::symlink,
    path::{Path, PathBuf},
};
use tracing::{debug, instrument, warn};

/// Deploy link mappings into target home directory.
#[derive(Debug, Clone, Copy)]
pub struct Linker<'a> {
    target: &'a Target,
    root: &'a Path,
}

impl<'a> Linker<'a> {
    /// Construct new linker for repository at root.
    ///
    /// Root should be absolute, since symlinks point at sources through it.
    pub fn new(target: &'a Target, root: &'a Path) -> Self {
        Self { target, root }
    }

    /// Link every mapping, recording each outcome.
    ///
    /// # Errors
    ///
    /// - Return [`LinkError`] only for failures that should abort the run,
    ///   see [`Linker::link`].
    #[instrument(skip_all, level = "debug")]
    pub fn link_all(
        &self,
        mappings: &[LinkMapping],
        prompter: &mut dyn Prompter,
        report: &mut Report,
    ) -> Result<()> {
        for mapping in mappings {
            for (step, outcome) in self.link(mapping, prompter)? {
                report.record(Phase::Link, step, outcome);
            }
        }

        Ok(())
    }

    /// Link one mapping.
    ///
    /// Returns outcome for each destination touched. File system failures
    /// become [`StepOutcome::Failed`] entries.
    ///
    /// # Errors
    ///
    /// - Return [`LinkError::Config`] if destination cannot be expanded.
    /// - Return [`LinkError::Pattern`] if glob source is malformed.
    /// - Return [`LinkError::Prompt`] if confirmation cannot be obtained.
    /// - Return [`LinkError::Identity`] if git identity prompt fails.
    pub fn link(
        &self,
        mapping: &LinkMapping,
        prompter: &mut dyn Prompter,
    ) -> Result<Vec<(String, StepOutcome)>> {
        let destination = mapping.destination.resolve(self.target.home())?;
        let pairs = self.expand(mapping, &destination)?;

        if pairs.is_empty() {
            match mapping.gate {
                Gate::Always => warn!("source {:?} does not exist", mapping.source),
                _ => debug!("optional source {:?} does not exist", mapping.source),
            }

            return Ok(vec![(
                self.step_name(&destination),
                StepOutcome::skipped("missing source"),
            )]);
        }

        // INVARIANT: Do not ask for confirmation when every link is in place.
        if !mapping.identity && pairs.iter().all(|(src, dst)| is_linked(src, dst)) {
            return Ok(pairs
                .iter()
                .map(|(_, dst)| (self.step_name(dst), StepOutcome::skipped("already linked")))
                .collect());
        }

        if mapping.gate == Gate::Confirm {
            let question = format!(
                "Link {} to {}? Existing file will be replaced.",
                destination.display(),
                mapping.source
            );
            if !prompter.confirm(&question)? {
                return Ok(vec![(
                    self.step_name(&destination),
                    StepOutcome::skipped("declined"),
                )]);
            }
        }

        let mut outcomes = Vec::with_capacity(pairs.len());
        for (source, destination) in pairs {
            let step = self.step_name(&destination);
            let source = if mapping.identity {
                match identity::prepare(self.target, &source, prompter) {
                    Ok(source) => source,
                    Err(err) if err.is_fatal() => return Err(err.into()),
                    Err(err) => {
                        outcomes.push((step, StepOutcome::failed(err)));
                        continue;
                    }
                }
            } else {
                source
            };

            let outcome = ensure_symlink(&source, &destination, self.target.owner())
                .unwrap_or_else(StepOutcome::failed);
            outcomes.push((step, outcome));
        }

        Ok(outcomes)
    }

    fn expand(&self, mapping: &LinkMapping, destination: &Path) -> Result<Vec<(PathBuf, PathBuf)>> {
        let source = self.root.join(&mapping.source);
        if !mapping.is_pattern() {
            if symlink_metadata(&source).is_err() {
                return Ok(Vec::new());
            }

            return Ok(vec![(source, destination.to_path_buf())]);
        }

        // INVARIANT: Only the mapping source is a pattern, never the repository root.
        let root = glob::Pattern::escape(&self.root.to_string_lossy());
        let pattern = Path::new(&root).join(&mapping.source);

        let mut pairs = Vec::new();
        for entry in glob::glob(&pattern.to_string_lossy())? {
            match entry {
                Ok(path) => {
                    let Some(name) = path.file_name() else {
                        continue;
                    };
                    let target = destination.join(name);
                    pairs.push((path, target));
                }
                Err(err) => warn!("skip unreadable match: {err}"),
            }
        }

        Ok(pairs)
    }

    fn step_name(&self, destination: &Path) -> String {
        destination
            .strip_prefix(self.target.home())
            .unwrap_or(destination)
            .display()
            .to_string()
    }
}

/// Destination already is a symlink to source.
pub fn is_linked(source: impl AsRef<Path>, destination: impl AsRef<Path>) -> bool {
    read_link(destination.as_ref())
        .map(|current| current == source.as_ref())
        .unwrap_or(false)
}

/// Make destination a symlink to source.
///
/// Creates missing parent directories, and replaces any file or symlink at
/// destination. When an owner is given, created directories and the
/// symlink itself are handed over to it.
///
/// # Errors
///
/// - Return [`LinkError::DestinationIsDirectory`] if destination is a real
///   directory.
/// - Return [`LinkError::Io`] if file system operations fail.
pub fn ensure_symlink(
    source: impl AsRef<Path>,
    destination: impl AsRef<Path>,
    owner: Option<Owner>,
) -> Result<StepOutcome> {
    let (source, destination) = (source.as_ref(), destination.as_ref());
    let io_err = |source: std::io::Error| LinkError::Io {
        source,
        path: destination.to_path_buf(),
    };

    match symlink_metadata(destination) {
        Ok(meta) if meta.file_type().is_symlink() => {
            if is_linked(source, destination) {
                return Ok(StepOutcome::skipped("already linked"));
            }
            debug!("replace symlink {}", destination.display());
            remove_file(destination).map_err(io_err)?;
        }
        Ok(meta) if meta.is_dir() => {
            return Err(LinkError::DestinationIsDirectory(destination.to_path_buf()));
        }
        Ok(_) => {
            debug!("replace file {}", destination.display());
            remove_file(destination).map_err(io_err)?;
        }
        Err(err) if err.kind() == ErrorKind::NotFound => {}
        Err(err) => return Err(io_err(err)),
    }

    if let Some(parent) = destination.parent() {
        let created = mkdirp::mkdirp(parent).map_err(io_err)?;
        if let (Some(created), Some(owner)) = (created, owner) {
            // INVARIANT: Only hand over directories this call created.
            for dir in parent.ancestors().take_while(|dir| dir.starts_with(&created)) {
                owner.apply(dir).map_err(io_err)?;
            }
        }
    }

    symlink(source, destination).map_err(io_err)?;
    if let Some(owner) = owner {
        owner.apply(destination).map_err(io_err)?;
    }

    Ok(StepOutcome::Done)
}

/// Linking error types.
#[derive(Debug, thiserror::Error)]
pub enum LinkError {
    /// Destination path cannot be expanded.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Glob source is malformed.
    #[error(transparent)]
    Pattern(#[from] glob::PatternError),

    /// Confirmation cannot be obtained.
    #[error(transparent)]
    Prompt(#[from] PromptError),

    /// Git identity override fails.
    #[error(transparent)]
    Identity(#[from] IdentityError),

    /// Real directory sits at destination.
    #[error("refusing to replace directory {:?}", .0.display())]
    DestinationIsDirectory(PathBuf),

    /// File system operation fails.
    #[error("failed to link {:?}", path.display())]
    Io {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },
}

/// Friendly result alias :3
type Result<T, E = LinkError> = std::result::Result<T, E>;
