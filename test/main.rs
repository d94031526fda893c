// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT


use anyhow::Result;
use dotstrap::{
    bootstrap::fetch::{PluginFetch, Result as FetchResult},
    config::{Manifest, PluginSource},
    path::Target,
    syscall::{Invocation, Result as SyscallResult, Syscall},
};
use indoc::indoc;
use std::{
    fs::{create_dir_all, write},
    path::{Path, PathBuf},
};

pub(crate) const MANIFEST: &str = indoc! {r#"
    [packages]
    update = ["apt-get", "update"]
    install = ["apt-get", "install", "-y"]
    names = ["zsh", "tmux"]

    [shell]
    name = "zsh"

    [[tool]]
    name = "nvm"
    guard = { path = ".nvm" }
    command = ["sh", "install-nvm.sh"]

    [[plugin]]
    name = "zsh-autosuggestions"
    url = "https://blah.org/zsh-autosuggestions.git"
    destination = ".zsh/zsh-autosuggestions"

    [[link]]
    source = "home/.zshrc"
    destination = ".zshrc"

    [[link]]
    source = "home/.gitconfig"
    destination = ".gitconfig"
    gate = "confirm"
    identity = true

    [[link]]
    source = "home/.ssh/config"
    destination = ".ssh/config"
    gate = "confirm"

    [[link]]
    source = "home/.zsh_aliases"
    destination = ".zsh_aliases"
    gate = "if-exists"

    [[link]]
    source = "config/nvim"
    destination = ".config/nvim"
"#};

/// Dotfiles repository and empty home directory below current directory.
pub(crate) struct RepoFixture {
    pub(crate) root: PathBuf,
    pub(crate) target: Target,
    pub(crate) manifest: Manifest,
}

impl RepoFixture {
    pub(crate) fn new() -> Result<Self> {
        let cwd = std::env::current_dir()?;
        let root = cwd.join("dotfiles");
        let home = cwd.join("home");
        create_dir_all(&home)?;

        let fixture = Self {
            root,
            target: Target::new("dotstrap-test-user", home),
            manifest: MANIFEST.parse()?,
        };
        fixture.track(
            "home/.zshrc",
            "source ~/.zsh/zsh-autosuggestions/zsh-autosuggestions.zsh\n",
        )?;
        fixture.track("home/.gitconfig", "[user]\n\tname = John Doe\n\temail = john@doe.com\n")?;
        fixture.track("home/.ssh/config", "Host *\n\tAddKeysToAgent yes\n")?;
        fixture.track("config/nvim/init.lua", "vim.o.number = true\n")?;

        Ok(fixture)
    }

    pub(crate) fn track(&self, path: impl AsRef<Path>, contents: impl AsRef<str>) -> Result<()> {
        let path = self.root.join(path);
        if let Some(parent) = path.parent() {
            create_dir_all(parent)?;
        }
        write(path, contents.as_ref())?;

        Ok(())
    }

    pub(crate) fn home(&self) -> &Path {
        self.target.home()
    }
}

/// Record invocations instead of running them.
#[derive(Debug, Default)]
pub(crate) struct RecordingShell {
    pub(crate) calls: Vec<String>,
}

impl Syscall for &mut RecordingShell {
    fn run(&mut self, invocation: &Invocation) -> SyscallResult<String> {
        self.calls.push(invocation.to_string());
        Ok(String::new())
    }
}

/// Create empty plugin directories instead of cloning.
#[derive(Debug, Default)]
pub(crate) struct DirFetcher {
    pub(crate) fetched: Vec<String>,
}

impl PluginFetch for &mut DirFetcher {
    fn fetch(&mut self, plugin: &PluginSource, destination: &Path) -> FetchResult<()> {
        self.fetched.push(plugin.name.clone());
        create_dir_all(destination).map_err(|err| git2::Error::from_str(&err.to_string()))?;

        Ok(())
    }
}
