// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Shell plugin fetching.
//!
//! Shell plugins are plain Git repositories cloned into the target home
//! directory. Cloning goes through libgit2, showing progress through a
//! progress bar. If the remote wants credentials, the user is prompted for
//! them while the progress bar is suspended.

use crate::config::PluginSource;

use auth_git2::{GitAuthenticator, Prompter};
use git2::{build::RepoBuilder, Config, FetchOptions, RemoteCallbacks};
use indicatif::{ProgressBar, ProgressStyle};
use inquire::{Password, Text};
use std::{
    path::Path,
    time::{Duration, Instant},
};
use tracing::{info, instrument};

/// Layer of indirection for fetching plugins.
pub trait PluginFetch {
    /// Fetch plugin into destination directory.
    fn fetch(&mut self, plugin: &PluginSource, destination: &Path) -> Result<()>;
}

/// Plugin fetching through libgit2.
#[derive(Debug, Default, Clone, Copy)]
pub struct Git2Fetcher;

impl PluginFetch for Git2Fetcher {
    /// Clone plugin repository from its remote.
    ///
    /// # Errors
    ///
    /// - Return [`FetchError::Git2`] if libgit2 operations fail.
    /// - Return [`FetchError::IndicatifStyleTemplate`] if progress bar
    ///   cannot be styled.
    #[instrument(skip(self, plugin), level = "debug")]
    fn fetch(&mut self, plugin: &PluginSource, destination: &Path) -> Result<()> {
        info!("clone {} from {}", plugin.name, plugin.url);
        let style = ProgressStyle::with_template(
            "{elapsed_precise:.green}  {msg:<30}  [{wide_bar:.yellow/blue}]",
        )?
        .progress_chars("-Cco.");
        let bar = ProgressBar::new(0).with_style(style);
        bar.set_message(plugin.name.clone());
        bar.enable_steady_tick(Duration::from_millis(100));

        let prompter = IndicatifPrompter::new(bar.clone());
        let authenticator = GitAuthenticator::default().set_prompter(prompter);
        let config = Config::open_default()?;

        let mut throttle = Instant::now();
        let mut rc = RemoteCallbacks::new();
        rc.credentials(authenticator.credentials(&config));
        rc.transfer_progress(|progress| {
            if throttle.elapsed() > Duration::from_millis(10) {
                throttle = Instant::now();
                bar.set_length(progress.total_objects() as u64);
                bar.set_position(progress.received_objects() as u64);
            }
            true
        });

        let mut fo = FetchOptions::new();
        fo.remote_callbacks(rc);
        let mut builder = RepoBuilder::new();
        builder.fetch_options(fo);
        if let Some(branch) = &plugin.branch {
            builder.branch(branch);
        }

        let result = builder.clone(&plugin.url, destination);
        bar.finish_and_clear();
        result?;

        Ok(())
    }
}

/// Git2 authentication prompter for progress bar.
#[derive(Debug, Clone)]
pub struct IndicatifPrompter {
    bar: ProgressBar,
}

impl IndicatifPrompter {
    /// Construct new progress bar authenticator.
    pub fn new(bar: ProgressBar) -> Self {
        Self { bar }
    }
}

impl Prompter for IndicatifPrompter {
    fn prompt_username_password(
        &mut self,
        url: &str,
        _config: &git2::Config,
    ) -> Option<(String, String)> {
        info!("authentication required at {url}");
        self.bar.suspend(|| -> Option<(String, String)> {
            let username = Text::new("username").prompt().ok()?;
            let password = Password::new("password")
                .without_confirmation()
                .prompt()
                .ok()?;
            Some((username, password))
        })
    }

    fn prompt_password(
        &mut self,
        username: &str,
        url: &str,
        _config: &git2::Config,
    ) -> Option<String> {
        info!("authentication required at {url} for user {username}");
        self.bar.suspend(|| -> Option<String> {
            Password::new("password")
                .without_confirmation()
                .prompt()
                .ok()
        })
    }

    fn prompt_ssh_key_passphrase(
        &mut self,
        ssh_key_path: &Path,
        _config: &git2::Config,
    ) -> Option<String> {
        info!(
            "authentication required with ssh key at {}",
            ssh_key_path.display()
        );
        self.bar.suspend(|| -> Option<String> {
            Password::new("passphrase")
                .without_confirmation()
                .prompt()
                .ok()
        })
    }
}

/// Plugin fetching error types.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    /// Style template cannot be set for progress bars.
    #[error(transparent)]
    IndicatifStyleTemplate(#[from] indicatif::style::TemplateError),

    /// Operations from libgit2 fail.
    #[error(transparent)]
    Git2(#[from] git2::Error),
}

/// Friendly result alias :3
pub type Result<T, E = FetchError> = std::result::Result<T, E>;
