// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! User prompting.
//!
//! Operations that clobber shared user state, e.g., the global git identity,
//! the SSH client configuration, or the login shell, need explicit consent
//! first. Consent is requested through a [`Prompter`], so the same bootstrap
//! logic runs with a human at the terminal or unattended.
//!
//! The answer to any confirmation defaults to "no".

use inquire::{Confirm, InquireError, Text};
use tracing::{debug, info};

/// Source of answers for gated operations.
pub trait Prompter {
    /// Ask a yes/no question. Empty input means no.
    fn confirm(&mut self, message: &str) -> Result<bool>;

    /// Ask for free text. Empty input yields [`None`].
    fn text(&mut self, message: &str) -> Result<Option<String>>;
}

impl<P> Prompter for Box<P>
where
    P: Prompter + ?Sized,
{
    fn confirm(&mut self, message: &str) -> Result<bool> {
        (**self).confirm(message)
    }

    fn text(&mut self, message: &str) -> Result<Option<String>> {
        (**self).text(message)
    }
}

/// Prompt the user at the terminal.
#[derive(Debug, Default, Clone, Copy)]
pub struct InquirePrompter;

impl Prompter for InquirePrompter {
    fn confirm(&mut self, message: &str) -> Result<bool> {
        match Confirm::new(message).with_default(false).prompt() {
            Ok(answer) => Ok(answer),
            // INVARIANT: Escape declines, interrupt aborts the whole run.
            Err(InquireError::OperationCanceled) => Ok(false),
            Err(err) => Err(err.into()),
        }
    }

    fn text(&mut self, message: &str) -> Result<Option<String>> {
        let answer = match Text::new(message).prompt() {
            Ok(answer) => answer,
            Err(InquireError::OperationCanceled) => return Ok(None),
            Err(err) => return Err(err.into()),
        };

        let answer = answer.trim();
        if answer.is_empty() {
            return Ok(None);
        }

        Ok(Some(answer.to_string()))
    }
}

/// Answer every prompt without asking anyone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unattended {
    /// Confirm every gated operation.
    AssumeYes,

    /// Decline every gated operation.
    AssumeNo,
}

impl Prompter for Unattended {
    fn confirm(&mut self, message: &str) -> Result<bool> {
        let answer = matches!(self, Self::AssumeYes);
        info!("{message} {}", if answer { "[assumed yes]" } else { "[assumed no]" });
        Ok(answer)
    }

    fn text(&mut self, message: &str) -> Result<Option<String>> {
        debug!("{message} [left empty]");
        Ok(None)
    }
}

/// Prompting error types.
#[derive(Debug, thiserror::Error)]
pub enum PromptError {
    /// Terminal prompt fails or is interrupted.
    #[error(transparent)]
    Inquire(#[from] InquireError),
}

/// Friendly result alias :3
pub type Result<T, E = PromptError> = std::result::Result<T, E>;
