// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Configuration layout.
//!
//! Specify the layout of the bootstrap __manifest__, the TOML file listing
//! everything a run provisions, installs, and links.
//!
//! # Manifest Lookup
//!
//! Dotstrap ships with a built-in manifest describing one fixed machine
//! setup. A repository can replace it by placing a `dotstrap.toml` file at
//! its top-level, and the user can point at any other manifest file from
//! the command line.
//!
//! # Home-Relative Paths
//!
//! Every destination in the manifest is a [`HomePath`]. Shell expansion is
//! deferred until the target home directory is known, so a leading `~`
//! always means the _target_ account's home directory, even when the process
//! itself runs with a different `$HOME`.

use serde::{Deserialize, Serialize};
use std::{
    fmt::{Display, Error as FmtError, Formatter, Result as FmtResult},
    env::VarError,
    fs::read_to_string,
    path::{Path, PathBuf},
    str::FromStr,
};
use tracing::{debug, info};

/// Name of manifest file looked up at repository top-level.
pub const MANIFEST_FILE: &str = "dotstrap.toml";

const BUILTIN_MANIFEST: &str = include_str!("manifest.toml");

/// Bootstrap manifest layout.
///
/// # General Layout
///
/// A manifest is split into the three phases of a bootstrap run: the
/// package listing for the provisioner, the tools, plugins, font, and login
/// shell for the toolchain installer, and the link mappings for the linker.
/// Every section is optional.
#[derive(Default, Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
pub struct Manifest {
    /// Package sources and packages to install.
    #[serde(default, skip_serializing_if = "PackageSettings::is_empty")]
    pub packages: PackageSettings,

    /// Font to download and install.
    pub font: Option<FontSource>,

    /// Login shell to switch the target account to.
    pub shell: Option<ShellSettings>,

    /// Tools installed through arbitrary commands.
    #[serde(default, rename = "tool", skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<ToolStep>,

    /// Shell plugins cloned from remote repositories.
    #[serde(default, rename = "plugin", skip_serializing_if = "Vec::is_empty")]
    pub plugins: Vec<PluginSource>,

    /// Files to symlink into the target home directory.
    #[serde(default, rename = "link", skip_serializing_if = "Vec::is_empty")]
    pub links: Vec<LinkMapping>,
}

impl Manifest {
    /// Parse manifest that ships with dotstrap.
    ///
    /// # Errors
    ///
    /// - Return [`ConfigError::Deserialize`] if built-in manifest is
    ///   malformed.
    pub fn builtin() -> Result<Self> {
        BUILTIN_MANIFEST.parse()
    }

    /// Load manifest for repository.
    ///
    /// Uses explicit manifest path if given. Otherwise, uses
    /// [`MANIFEST_FILE`] at repository top-level if it exists, or falls back
    /// to [`Manifest::builtin`].
    ///
    /// # Errors
    ///
    /// - Return [`ConfigError::Read`] if manifest file cannot be read.
    /// - Return [`ConfigError::Deserialize`] if manifest is malformed.
    /// - Return [`ConfigError::Invalid`] if manifest fails validation.
    pub fn load(root: impl AsRef<Path>, explicit: Option<&Path>) -> Result<Self> {
        let path = match explicit {
            Some(path) => path.to_path_buf(),
            None => root.as_ref().join(MANIFEST_FILE),
        };

        if explicit.is_none() && !path.exists() {
            info!("no {MANIFEST_FILE} in repository, using built-in manifest");
            return Self::builtin();
        }

        debug!("load manifest from {}", path.display());
        read_to_string(&path)
            .map_err(|err| ConfigError::Read { source: err, path })?
            .parse()
    }

    /// Check manifest for entries that cannot be executed.
    ///
    /// # Errors
    ///
    /// - Return [`ConfigError::Invalid`] for the first bad entry found.
    pub fn validate(&self) -> Result<()> {
        for source in &self.packages.sources {
            if source.is_empty() {
                return Err(ConfigError::Invalid("packages.sources entry is empty".into()));
            }
        }

        if !self.packages.names.is_empty() && self.packages.install.is_empty() {
            return Err(ConfigError::Invalid(
                "packages.install must be set to install packages".into(),
            ));
        }

        for tool in &self.tools {
            if tool.command.is_empty() || tool.command[0].trim().is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "tool {:?} has empty command",
                    tool.name
                )));
            }
        }

        for link in &self.links {
            if link.source.trim().is_empty() || link.destination.as_str().trim().is_empty() {
                return Err(ConfigError::Invalid("link source and destination must be set".into()));
            }

            if Path::new(&link.source).is_absolute() {
                return Err(ConfigError::Invalid(format!(
                    "link source {:?} must be relative to repository",
                    link.source
                )));
            }
        }

        Ok(())
    }
}

impl FromStr for Manifest {
    type Err = ConfigError;

    fn from_str(data: &str) -> Result<Self, Self::Err> {
        let manifest: Manifest = toml::de::from_str(data).map_err(ConfigError::Deserialize)?;
        manifest.validate()?;

        Ok(manifest)
    }
}

impl Display for Manifest {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        fmt.write_str(
            toml::ser::to_string_pretty(self)
                .map_err(ConfigError::Serialize)?
                .as_str(),
        )
    }
}

/// Package manager settings.
///
/// Commands are given as argument vectors. Each package name is appended to
/// the install command and installed on its own, so one broken package does
/// not take the rest down with it.
#[derive(Default, Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PackageSettings {
    /// Commands registering extra package sources.
    pub sources: Vec<Vec<String>>,

    /// Command refreshing the package index.
    pub update: Vec<String>,

    /// Command installing one package, name appended.
    pub install: Vec<String>,

    /// Package names to install.
    pub names: Vec<String>,
}

impl PackageSettings {
    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
            && self.update.is_empty()
            && self.install.is_empty()
            && self.names.is_empty()
    }
}

/// Tool installed by running a command.
#[derive(Default, Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
pub struct ToolStep {
    /// Name used in logs and the run summary.
    pub name: String,

    /// Skip installation when guard holds.
    pub guard: Option<Guard>,

    /// Installation command, run as the target account.
    pub command: Vec<String>,
}

/// Existence check marking an installation step as done.
#[derive(Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Guard {
    /// Path below target home directory exists.
    Path(HomePath),

    /// Binary can be found on `PATH`.
    Command(String),
}

/// Shell plugin cloned from a remote repository.
#[derive(Default, Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
pub struct PluginSource {
    /// Name of plugin.
    pub name: String,

    /// Remote URL to clone plugin from.
    pub url: String,

    /// Branch to check out instead of the default branch.
    pub branch: Option<String>,

    /// Directory to clone plugin into.
    pub destination: HomePath,
}

/// Font archive to download and install.
#[derive(Default, Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
pub struct FontSource {
    /// Name of font family.
    pub name: String,

    /// URL of zip archive containing the font.
    pub url: String,

    /// Directory to extract font into.
    pub destination: HomePath,
}

/// Login shell settings.
#[derive(Default, Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
pub struct ShellSettings {
    /// Binary name of shell, e.g., "zsh".
    pub name: String,
}

/// Symlink from repository file into target home directory.
#[derive(Default, Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
pub struct LinkMapping {
    /// Path relative to repository top-level. May be a glob pattern.
    pub source: String,

    /// Path relative to target home directory.
    ///
    /// If source is a glob pattern, this is the directory that receives a
    /// link for every match.
    pub destination: HomePath,

    /// Condition for creating the link.
    #[serde(default)]
    pub gate: Gate,

    /// Offer to override the git identity of source before linking it.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub identity: bool,
}

impl LinkMapping {
    /// Source contains glob metacharacters.
    pub fn is_pattern(&self) -> bool {
        self.source.contains(['*', '?', '['])
    }
}

/// Condition for creating a link.
#[derive(Default, Debug, PartialEq, Eq, Clone, Copy, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Gate {
    /// Link unconditionally. Missing source is worth a warning.
    #[default]
    Always,

    /// Link only if source exists. Missing source is expected.
    IfExists,

    /// Link only after explicit confirmation.
    Confirm,
}

/// Path relative to target home directory.
///
/// May use `~` and `$HOME`, both bound to a given home directory instead of
/// the process environment. No other variable is expanded, since an
/// elevated run would otherwise see the superuser's environment.
#[derive(Default, Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
pub struct HomePath(String);

impl HomePath {
    /// Construct new home-relative path.
    pub fn new(path: impl Into<String>) -> Self {
        Self(path.into())
    }

    /// Path as written in the manifest.
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    /// Expand into absolute path below home directory.
    ///
    /// # Errors
    ///
    /// - Return [`ConfigError::ShellExpansion`] if path names any variable
    ///   other than `$HOME`.
    pub fn resolve(&self, home: impl AsRef<Path>) -> Result<PathBuf> {
        let home = home.as_ref();
        let home_str = home.to_string_lossy().into_owned();
        let expanded = shellexpand::full_with_context(
            self.0.as_str(),
            || Some(home_str.as_str()),
            |var| match var {
                "HOME" => Ok(Some(home_str.as_str())),
                _ => Err(VarError::NotPresent),
            },
        )
        .map_err(ConfigError::ShellExpansion)?;

        // INVARIANT: Relative paths are always relative to home directory.
        Ok(home.join(&*expanded))
    }
}

impl Display for HomePath {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        fmt.write_str(self.as_str())
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read manifest file.
    #[error("failed to read manifest at {:?}", path.display())]
    Read {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Failed to deserialize configuration.
    #[error(transparent)]
    Deserialize(#[from] toml::de::Error),

    /// Failed to serialize configuration.
    #[error(transparent)]
    Serialize(#[from] toml::ser::Error),

    /// Failed to perform shell expansion on configuration.
    #[error(transparent)]
    ShellExpansion(#[from] shellexpand::LookupError<VarError>),

    /// Manifest entry cannot be executed.
    #[error("invalid manifest: {0}")]
    Invalid(String),
}

impl From<ConfigError> for FmtError {
    fn from(_: ConfigError) -> Self {
        FmtError
    }
}

/// Friendly result alias :3
type Result<T, E = ConfigError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;
    use pretty_assertions::assert_eq;
    use sealed_test::prelude::*;
    use simple_test_case::test_case;

    #[test]
    fn deserialize_manifest() -> anyhow::Result<()> {
        let result: Manifest = r#"
            [packages]
            update = ["apt-get", "update"]
            install = ["apt-get", "install", "-y"]
            names = ["zsh", "git"]

            [shell]
            name = "zsh"

            [[tool]]
            name = "nvm"
            guard = { path = ".nvm" }
            command = ["sh", "install.sh"]

            [[plugin]]
            name = "autosuggestions"
            url = "https://blah.org/autosuggestions.git"
            destination = ".zsh/autosuggestions"

            [[link]]
            source = "home/.zshrc"
            destination = ".zshrc"

            [[link]]
            source = "home/.gitconfig"
            destination = "~/.gitconfig"
            gate = "confirm"
            identity = true
        "#
        .parse()?;

        let expect = Manifest {
            packages: PackageSettings {
                sources: Vec::new(),
                update: vec!["apt-get".into(), "update".into()],
                install: vec!["apt-get".into(), "install".into(), "-y".into()],
                names: vec!["zsh".into(), "git".into()],
            },
            font: None,
            shell: Some(ShellSettings { name: "zsh".into() }),
            tools: vec![ToolStep {
                name: "nvm".into(),
                guard: Some(Guard::Path(HomePath::new(".nvm"))),
                command: vec!["sh".into(), "install.sh".into()],
            }],
            plugins: vec![PluginSource {
                name: "autosuggestions".into(),
                url: "https://blah.org/autosuggestions.git".into(),
                branch: None,
                destination: HomePath::new(".zsh/autosuggestions"),
            }],
            links: vec![
                LinkMapping {
                    source: "home/.zshrc".into(),
                    destination: HomePath::new(".zshrc"),
                    gate: Gate::Always,
                    identity: false,
                },
                LinkMapping {
                    source: "home/.gitconfig".into(),
                    destination: HomePath::new("~/.gitconfig"),
                    gate: Gate::Confirm,
                    identity: true,
                },
            ],
        };

        assert_eq!(result, expect);

        Ok(())
    }

    #[test]
    fn serialize_manifest() {
        let result = Manifest {
            shell: Some(ShellSettings { name: "zsh".into() }),
            links: vec![LinkMapping {
                source: "home/.zshrc".into(),
                destination: HomePath::new(".zshrc"),
                gate: Gate::IfExists,
                identity: false,
            }],
            ..Default::default()
        }
        .to_string();

        let expect = indoc! {r#"
            [shell]
            name = "zsh"

            [[link]]
            source = "home/.zshrc"
            destination = ".zshrc"
            gate = "if-exists"
        "#};

        assert_eq!(result, expect);
    }

    #[test]
    fn builtin_manifest_gates_shared_state() -> anyhow::Result<()> {
        let manifest = Manifest::builtin()?;
        let gated = manifest
            .links
            .iter()
            .filter(|link| link.gate == Gate::Confirm)
            .map(|link| link.destination.as_str())
            .collect::<Vec<_>>();

        assert_eq!(gated, vec![".gitconfig", ".ssh/config"]);
        assert!(manifest.shell.is_some());

        Ok(())
    }

    #[test_case(r#"[[tool]]
name = "x"
command = []"#; "empty tool command")]
    #[test_case(r#"[[link]]
source = "/etc/passwd"
destination = ".passwd""#; "absolute link source")]
    #[test_case(r#"[packages]
names = ["zsh"]"#; "packages without install command")]
    #[test]
    fn reject_invalid_manifest(data: &str) {
        let result = data.parse::<Manifest>();
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[sealed_test(env = [("HOME", "/home/process"), ("NVIM_APPNAME", "nvim-dev")])]
    fn home_path_expands_against_target_home() -> anyhow::Result<()> {
        let home = Path::new("/home/target");

        assert_eq!(HomePath::new(".zshrc").resolve(home)?, home.join(".zshrc"));
        assert_eq!(HomePath::new("~/.zshrc").resolve(home)?, home.join(".zshrc"));
        assert_eq!(
            HomePath::new("$HOME/.config/nvim").resolve(home)?,
            home.join(".config/nvim")
        );

        Ok(())
    }

    #[sealed_test(env = [("NVIM_APPNAME", "nvim-dev")])]
    fn home_path_rejects_process_variables() {
        let result = HomePath::new(".config/$NVIM_APPNAME").resolve("/home/target");
        assert!(matches!(result, Err(ConfigError::ShellExpansion(_))));
    }

    #[sealed_test]
    fn load_falls_back_to_builtin() -> anyhow::Result<()> {
        let root = std::env::current_dir()?;
        let result = Manifest::load(&root, None)?;

        assert_eq!(result, Manifest::builtin()?);

        Ok(())
    }

    #[sealed_test]
    fn load_repository_manifest() -> anyhow::Result<()> {
        let root = std::env::current_dir()?;
        std::fs::write(
            root.join(MANIFEST_FILE),
            indoc! {r#"
                [[link]]
                source = "home/.zshrc"
                destination = ".zshrc"
            "#},
        )?;
        let result = Manifest::load(&root, None)?;

        assert_eq!(result.links.len(), 1);
        assert!(result.tools.is_empty());

        Ok(())
    }
}
