// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Git identity override.
//!
//! The tracked git configuration carries somebody's name and email. Before
//! it is linked, the user may override both. The override is written into a
//! generated copy of the tracked file, so the repository itself stays
//! untouched, and the destination is linked to that copy instead.

use crate::{
    path::Target,
    prompt::{PromptError, Prompter},
};

use git2::Config;
use std::{
    fs::copy,
    path::{Path, PathBuf},
};
use tracing::{info, instrument};

/// Location of generated git configuration relative to target home.
pub const GENERATED_GITCONFIG: &str = ".local/share/dotstrap/gitconfig";

/// Git identity to write into generated configuration.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Identity {
    pub name: Option<String>,
    pub email: Option<String>,
}

impl Identity {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.email.is_none()
    }
}

/// Offer identity override for template, and return path to link.
///
/// Returns template itself if the user declines, or leaves both fields
/// empty.
///
/// # Errors
///
/// - Return [`IdentityError::Prompt`] if user cannot be asked.
/// - Return [`IdentityError::Io`] or [`IdentityError::Git2`] if generated
///   configuration cannot be written.
#[instrument(skip(target, prompter), level = "debug")]
pub fn prepare(target: &Target, template: &Path, prompter: &mut dyn Prompter) -> Result<PathBuf> {
    if !prompter.confirm("Override git user.name and user.email?")? {
        return Ok(template.to_path_buf());
    }

    let identity = Identity {
        name: prompter.text("git user.name:")?,
        email: prompter.text("git user.email:")?,
    };
    if identity.is_empty() {
        info!("no identity given, keep {}", template.display());
        return Ok(template.to_path_buf());
    }

    let generated = target.home().join(GENERATED_GITCONFIG);
    write_identity(template, &generated, &identity)?;
    if let Some(owner) = target.owner() {
        for path in generated
            .ancestors()
            .take_while(|path| path != &target.home())
        {
            owner.apply(path).map_err(|err| IdentityError::Io {
                source: err,
                path: path.to_path_buf(),
            })?;
        }
    }

    Ok(generated)
}

/// Copy template to generated path, and set identity in the copy.
///
/// Fields left empty keep the template's value.
///
/// # Errors
///
/// - Return [`IdentityError::Io`] if template cannot be copied.
/// - Return [`IdentityError::Git2`] if identity cannot be written.
pub fn write_identity(template: &Path, generated: &Path, identity: &Identity) -> Result<()> {
    let io_err = |source: std::io::Error| IdentityError::Io {
        source,
        path: generated.to_path_buf(),
    };

    if let Some(parent) = generated.parent() {
        mkdirp::mkdirp(parent).map_err(io_err)?;
    }
    copy(template, generated).map_err(io_err)?;

    let mut config = Config::open(generated)?;
    if let Some(name) = &identity.name {
        config.set_str("user.name", name)?;
    }
    if let Some(email) = &identity.email {
        config.set_str("user.email", email)?;
    }

    info!("wrote git identity to {}", generated.display());
    Ok(())
}

/// Git identity override error types.
#[derive(Debug, thiserror::Error)]
pub enum IdentityError {
    /// User cannot be asked.
    #[error(transparent)]
    Prompt(#[from] PromptError),

    /// Generated configuration cannot be created.
    #[error("failed to write git configuration {:?}", path.display())]
    Io {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Identity cannot be set through libgit2.
    #[error(transparent)]
    Git2(#[from] git2::Error),
}

impl IdentityError {
    /// Error should abort the run instead of failing one step.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Prompt(_))
    }
}

/// Friendly result alias :3
type Result<T, E = IdentityError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prompt::Unattended;
    use indoc::indoc;
    use pretty_assertions::assert_eq;
    use sealed_test::prelude::*;
    use std::{collections::VecDeque, fs::write};

    struct Scripted {
        confirms: VecDeque<bool>,
        texts: VecDeque<Option<String>>,
    }

    impl Prompter for Scripted {
        fn confirm(&mut self, _: &str) -> crate::prompt::Result<bool> {
            Ok(self.confirms.pop_front().unwrap_or(false))
        }

        fn text(&mut self, _: &str) -> crate::prompt::Result<Option<String>> {
            Ok(self.texts.pop_front().flatten())
        }
    }

    const TEMPLATE: &str = indoc! {r#"
        [user]
            name = John Doe
            email = john@doe.com
        [init]
            defaultBranch = main
    "#};

    #[sealed_test]
    fn override_writes_generated_copy() -> anyhow::Result<()> {
        let cwd = std::env::current_dir()?;
        let template = cwd.join("gitconfig");
        write(&template, TEMPLATE)?;
        let target = Target::new("jdoe", cwd.join("home"));
        let mut prompter = Scripted {
            confirms: VecDeque::from([true]),
            texts: VecDeque::from([Some("Jane Roe".to_string()), None]),
        };

        let result = prepare(&target, &template, &mut prompter)?;

        assert_eq!(result, target.home().join(GENERATED_GITCONFIG));
        let config = Config::open(&result)?;
        assert_eq!(config.get_string("user.name")?, "Jane Roe");
        assert_eq!(config.get_string("user.email")?, "john@doe.com");
        assert_eq!(config.get_string("init.defaultBranch")?, "main");
        assert_eq!(std::fs::read_to_string(&template)?, TEMPLATE);

        Ok(())
    }

    #[sealed_test]
    fn declined_override_keeps_template() -> anyhow::Result<()> {
        let cwd = std::env::current_dir()?;
        let template = cwd.join("gitconfig");
        write(&template, TEMPLATE)?;
        let target = Target::new("jdoe", cwd.join("home"));

        let result = prepare(&target, &template, &mut Unattended::AssumeNo)?;

        assert_eq!(result, template);
        assert!(!target.home().join(GENERATED_GITCONFIG).exists());

        Ok(())
    }
}
