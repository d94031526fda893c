// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Machine bootstrapping from a dotfiles repository.
//!
//! Dotstrap provisions packages, installs a small toolchain, and symlinks
//! tracked configuration files from a repository into the home directory
//! of a target account. Runs are idempotent: every step checks whether its
//! work is already done, so a failed run is retried by running it again.
//!
//! # See Also
//!
//! 1. [`bootstrap`] for the phases of a run.
//! 2. [`config::Manifest`] for the manifest layout.
//! 3. [`path::Target`] for target account resolution.

pub mod bootstrap;
pub mod config;
pub mod path;
pub mod prompt;
pub mod report;
pub mod syscall;
