// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Path resolution utilities.
//!
//! Determine which account a bootstrap run operates on, and where that
//! account's home directory lives.
//!
//! # Elevated Runs
//!
//! Package installation needs superuser privileges, so dotstrap is usually
//! invoked through sudo. In that case `$HOME` may point at the superuser's
//! home directory, or worse, at the invoking user's home directory while
//! every file created is owned by root. Dotstrap inspects the elevation
//! indicator `SUDO_USER` instead: if it names a non-superuser account, that
//! account is the target, and its home directory is taken from the system
//! user database rather than from the environment.
//!
//! The resolved [`Target`] is built once per run and handed to every phase
//! explicitly. Nothing else re-reads the environment to figure out whose
//! home directory to touch.

use nix::unistd::{Uid, User};
use std::{
    fs::read_dir,
    io,
    os::unix::fs::lchown,
    path::{Path, PathBuf},
};
use tracing::{debug, info, instrument};

/// Environment variable naming the account an elevated run works for.
pub const ELEVATION_VAR: &str = "SUDO_USER";

/// Environment variable naming the invoking user.
pub const USER_VAR: &str = "USER";

/// Account and home directory a bootstrap run operates on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    user: String,
    home: PathBuf,
    owner: Option<Owner>,
    privileged: bool,
}

impl Target {
    /// Construct new unprivileged target for a user and home directory.
    pub fn new(user: impl Into<String>, home: impl Into<PathBuf>) -> Self {
        Self {
            user: user.into(),
            home: home.into(),
            owner: None,
            privileged: false,
        }
    }

    /// Hand ownership of created files over to another account.
    pub fn with_owner(mut self, owner: Owner) -> Self {
        self.owner = Some(owner);
        self
    }

    /// Mark whether the current process already runs as the superuser.
    pub fn with_privileges(mut self, privileged: bool) -> Self {
        self.privileged = privileged;
        self
    }

    /// Resolve target from the process environment.
    ///
    /// Uses the account named by [`ELEVATION_VAR`] if it is set to anything
    /// but the superuser. Otherwise, falls back to the invoking user.
    ///
    /// # Errors
    ///
    /// - Return [`PathError::UnknownUser`] if the elevated account does not
    ///   exist in the user database.
    /// - Return [`PathError::UserLookup`] if the user database cannot be
    ///   queried.
    /// - Return [`PathError::NoWayHome`] if the invoking user's home
    ///   directory cannot be determined.
    #[instrument(level = "debug")]
    pub fn resolve() -> Result<Self> {
        let privileged = Uid::effective().is_root();
        let target = match std::env::var(ELEVATION_VAR) {
            Ok(name) if !name.is_empty() && name != "root" => Self::elevated(&name)?,
            _ => Self::invoking()?,
        };

        info!(
            "target user {} with home {}",
            target.user,
            target.home.display()
        );

        Ok(target.with_privileges(privileged))
    }

    fn elevated(name: &str) -> Result<Self> {
        debug!("elevation indicator names {name}");
        let entry = lookup(name)?.ok_or_else(|| PathError::UnknownUser(name.into()))?;

        Ok(Self::new(entry.name, entry.dir).with_owner(Owner {
            uid: entry.uid.as_raw(),
            gid: entry.gid.as_raw(),
        }))
    }

    fn invoking() -> Result<Self> {
        let home = dirs::home_dir().ok_or(PathError::NoWayHome)?;
        let user = match std::env::var(USER_VAR) {
            Ok(name) if !name.is_empty() => name,
            _ => User::from_uid(Uid::current())
                .map_err(|err| PathError::UserLookup {
                    source: err,
                    user: Uid::current().to_string(),
                })?
                .map(|entry| entry.name)
                .ok_or(PathError::NoWayHome)?,
        };

        Ok(Self::new(user, home))
    }

    /// Name of target account.
    pub fn user(&self) -> &str {
        &self.user
    }

    /// Absolute path to target account's home directory.
    pub fn home(&self) -> &Path {
        self.home.as_path()
    }

    /// Account that should own created files, if not the current process.
    pub fn owner(&self) -> Option<Owner> {
        self.owner
    }

    /// Current process runs with superuser privileges.
    pub fn is_privileged(&self) -> bool {
        self.privileged
    }

    /// Login shell of target account according to user database.
    pub fn login_shell(&self) -> Option<PathBuf> {
        lookup(&self.user).ok().flatten().map(|entry| entry.shell)
    }
}

/// Numeric owner of files created on behalf of another account.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Owner {
    pub uid: u32,
    pub gid: u32,
}

impl Owner {
    /// Change ownership of path without following symlinks.
    pub fn apply(&self, path: impl AsRef<Path>) -> io::Result<()> {
        lchown(path.as_ref(), Some(self.uid), Some(self.gid))
    }

    /// Change ownership of every entry below and including path.
    pub fn apply_tree(&self, path: impl AsRef<Path>) -> io::Result<()> {
        let path = path.as_ref();
        self.apply(path)?;

        if path.is_dir() && !path.is_symlink() {
            for entry in read_dir(path)? {
                self.apply_tree(entry?.path())?;
            }
        }

        Ok(())
    }
}

fn lookup(name: &str) -> Result<Option<User>> {
    User::from_name(name).map_err(|err| PathError::UserLookup {
        source: err,
        user: name.into(),
    })
}

/// Target resolution error types.
#[derive(Debug, thiserror::Error)]
pub enum PathError {
    /// Home directory of invoking user cannot be determined.
    #[error("cannot determine absolute path to user's home directory")]
    NoWayHome,

    /// Elevated account is missing from the user database.
    #[error("user {0:?} named by SUDO_USER does not exist")]
    UnknownUser(String),

    /// User database query fails.
    #[error("failed to look up user {user:?}")]
    UserLookup {
        #[source]
        source: nix::Error,
        user: String,
    },
}

/// Friendly result alias :3
pub type Result<T, E = PathError> = std::result::Result<T, E>;
