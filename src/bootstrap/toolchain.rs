// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Toolchain installation.
//!
//! Installs tools, the font, and shell plugins into the target home
//! directory, then offers to switch the login shell. Every step checks first
//! whether its work is already done, so re-running a bootstrap only redoes
//! what previously failed.
//!
//! Failures of external tools are recorded and skipped over. The one
//! exception is the login shell: once the user agreed to switch shells, not
//! finding the shell binary aborts the run.

use crate::{
    bootstrap::fetch::PluginFetch,
    config::{ConfigError, FontSource, Guard, PluginSource, ShellSettings, ToolStep},
    path::Target,
    prompt::{PromptError, Prompter},
    report::{Phase, Report, StepOutcome},
    syscall::{find_program, Invocation, Syscall},
};

use std::{
    env::var_os,
    ffi::OsStr,
    fs::remove_dir_all,
    path::{Path, PathBuf},
};
use tempfile::TempDir;
use tracing::{debug, instrument, warn};

/// Environment variable overriding path to login shell binary.
pub const SHELL_OVERRIDE_VAR: &str = "DOTSTRAP_SHELL";

/// Run tool installation commands whose guard does not hold yet.
///
/// # Errors
///
/// - Return [`ToolchainError::Config`] if guard path cannot be expanded.
#[instrument(skip_all, level = "debug")]
pub fn install_tools(
    target: &Target,
    tools: &[ToolStep],
    syscall: &mut dyn Syscall,
    report: &mut Report,
) -> Result<()> {
    for tool in tools {
        if let Some(guard) = &tool.guard {
            if guard_holds(target, guard)? {
                let outcome = StepOutcome::skipped("already installed");
                report.record(Phase::Toolchain, &tool.name, outcome);
                continue;
            }
        }

        let outcome = match Invocation::from_argv(&tool.command) {
            Ok(invocation) => run_as_user(target, invocation, syscall),
            Err(err) => StepOutcome::failed(err),
        };
        report.record(Phase::Toolchain, &tool.name, outcome);
    }

    Ok(())
}

/// Download, extract, and register font unless already installed.
///
/// # Errors
///
/// - Return [`ToolchainError::Config`] if destination cannot be expanded.
#[instrument(skip_all, level = "debug")]
pub fn install_font(
    target: &Target,
    font: Option<&FontSource>,
    syscall: &mut dyn Syscall,
    report: &mut Report,
) -> Result<()> {
    let Some(font) = font else {
        return Ok(());
    };

    let step = format!("font {}", font.name);
    let destination = font.destination.resolve(target.home())?;
    if destination.exists() {
        report.record(Phase::Toolchain, step, StepOutcome::skipped("already installed"));
        return Ok(());
    }

    let staging = match stage_download(target) {
        Ok(staging) => staging,
        Err(err) => {
            report.record(Phase::Toolchain, step, StepOutcome::failed(err));
            return Ok(());
        }
    };
    let archive = staging.path().join(format!("{}.zip", font.name));
    let steps = [
        Invocation::new("curl")
            .args(["-fsSL", "-o"])
            .arg(&archive)
            .arg(&font.url),
        Invocation::new("unzip")
            .args(["-o", "-q"])
            .arg(&archive)
            .arg("-d")
            .arg(&destination),
        Invocation::new("fc-cache").arg("-f").arg(&destination),
    ];

    let mut outcome = StepOutcome::Done;
    for invocation in steps {
        outcome = run_as_user(target, invocation, syscall);
        if outcome.is_failed() {
            // INVARIANT: Leave no half-extracted font behind to satisfy the guard.
            discard_partial(&destination);
            break;
        }
    }

    if let Err(err) = staging.close() {
        debug!("cannot remove download directory: {err}");
    }
    report.record(Phase::Toolchain, step, outcome);

    Ok(())
}

/// Fetch shell plugins that are not present yet.
///
/// # Errors
///
/// - Return [`ToolchainError::Config`] if destination cannot be expanded.
#[instrument(skip_all, level = "debug")]
pub fn clone_plugins(
    target: &Target,
    plugins: &[PluginSource],
    fetcher: &mut dyn PluginFetch,
    report: &mut Report,
) -> Result<()> {
    for plugin in plugins {
        let step = format!("plugin {}", plugin.name);
        let destination = plugin.destination.resolve(target.home())?;
        if destination.exists() {
            report.record(Phase::Toolchain, step, StepOutcome::skipped("already cloned"));
            continue;
        }

        let outcome = match fetcher.fetch(plugin, &destination) {
            Ok(()) => match target.owner().map(|owner| owner.apply_tree(&destination)) {
                Some(Err(err)) => StepOutcome::failed(err),
                _ => StepOutcome::Done,
            },
            Err(err) => {
                discard_partial(&destination);
                StepOutcome::failed(err)
            }
        };
        report.record(Phase::Toolchain, step, outcome);
    }

    Ok(())
}

/// Offer to switch target account's login shell.
///
/// Skipped if the account already uses the shell. Shell binary is resolved
/// only after the user agreed to switch.
///
/// # Errors
///
/// - Return [`ToolchainError::Prompt`] if user cannot be asked.
/// - Return [`ToolchainError::UnresolvedShell`] if shell binary cannot be
///   found.
#[instrument(skip_all, level = "debug")]
pub fn change_login_shell(
    target: &Target,
    shell: Option<&ShellSettings>,
    syscall: &mut dyn Syscall,
    prompter: &mut dyn Prompter,
    report: &mut Report,
) -> Result<()> {
    let Some(shell) = shell else {
        return Ok(());
    };

    let step = format!("login shell {}", shell.name);
    if let Some(current) = target.login_shell() {
        if current.file_name() == Some(OsStr::new(&shell.name)) {
            let reason = format!("already {}", current.display());
            report.record(Phase::Toolchain, step, StepOutcome::skipped(reason));
            return Ok(());
        }
    }

    let question = format!("Change login shell of {} to {}?", target.user(), shell.name);
    if !prompter.confirm(&question)? {
        report.record(Phase::Toolchain, step, StepOutcome::skipped("declined"));
        return Ok(());
    }

    let path = resolve_shell(&shell.name)?;
    let invocation = Invocation::new("chsh")
        .arg("-s")
        .arg(&path)
        .arg(target.user())
        .interactive();
    let outcome = match syscall.run(&invocation) {
        Ok(_) => StepOutcome::Done,
        Err(err) => StepOutcome::failed(err),
    };
    report.record(Phase::Toolchain, step, outcome);

    Ok(())
}

/// Locate login shell binary.
///
/// Prefers [`SHELL_OVERRIDE_VAR`], then searches `PATH` for shell name.
///
/// # Errors
///
/// - Return [`ToolchainError::UnresolvedShell`] if no binary is found.
pub fn resolve_shell(name: &str) -> Result<PathBuf> {
    if let Some(path) = var_os(SHELL_OVERRIDE_VAR).filter(|path| !path.is_empty()) {
        let path = PathBuf::from(path);
        if !path.is_file() {
            return Err(ToolchainError::UnresolvedShell(path.display().to_string()));
        }

        return Ok(path);
    }

    find_program(name).ok_or_else(|| ToolchainError::UnresolvedShell(name.into()))
}

/// Private directory to download into, writable by the target account.
fn stage_download(target: &Target) -> std::io::Result<TempDir> {
    let staging = tempfile::Builder::new().prefix("dotstrap-").tempdir()?;
    if let Some(owner) = target.owner() {
        owner.apply(staging.path())?;
    }

    Ok(staging)
}

fn discard_partial(destination: &Path) {
    if !destination.exists() {
        return;
    }

    if let Err(err) = remove_dir_all(destination) {
        warn!("cannot remove partial install {}: {err}", destination.display());
    }
}

fn guard_holds(target: &Target, guard: &Guard) -> Result<bool> {
    let holds = match guard {
        Guard::Path(path) => path.resolve(target.home())?.exists(),
        // INVARIANT: User-local binaries count even when not on our PATH.
        Guard::Command(name) => {
            find_program(name).is_some() || target.home().join(".local/bin").join(name).is_file()
        }
    };
    debug!("guard {guard:?} holds: {holds}");

    Ok(holds)
}

fn run_as_user(target: &Target, invocation: Invocation, syscall: &mut dyn Syscall) -> StepOutcome {
    let invocation = invocation
        .env("HOME", target.home().as_os_str())
        .as_user(target);

    match syscall.run(&invocation) {
        Ok(output) => {
            if !output.is_empty() {
                debug!("{output}");
            }
            StepOutcome::Done
        }
        Err(err) => {
            warn!("{invocation} failed");
            StepOutcome::failed(err)
        }
    }
}

/// Toolchain installation error types.
#[derive(Debug, thiserror::Error)]
pub enum ToolchainError {
    /// Manifest path cannot be expanded.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// User cannot be asked.
    #[error(transparent)]
    Prompt(#[from] PromptError),

    /// Login shell binary cannot be found.
    #[error("cannot resolve login shell {0:?}")]
    UnresolvedShell(String),
}

/// Friendly result alias :3
type Result<T, E = ToolchainError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        bootstrap::fetch::{FetchError, Result as FetchResult},
        config::HomePath,
        prompt::Unattended,
        syscall::fake::RecordingShell,
    };
    use pretty_assertions::assert_eq;
    use sealed_test::prelude::*;
    use std::{fs::create_dir_all, path::Path};

    fn tool(name: &str, guard: Option<Guard>) -> ToolStep {
        ToolStep {
            name: name.into(),
            guard,
            command: vec!["sh".into(), format!("install-{name}.sh")],
        }
    }

    #[sealed_test]
    fn install_tools_skips_guarded_and_survives_failure() -> anyhow::Result<()> {
        let home = std::env::current_dir()?;
        create_dir_all(home.join(".nvm"))?;
        let target = Target::new("jdoe", &home);
        let tools = vec![
            tool("nvm", Some(Guard::Path(HomePath::new(".nvm")))),
            tool("tldr", None),
            tool("kubectl", Some(Guard::Command("dotstrap-no-such-binary".into()))),
        ];
        let mut shell = RecordingShell::failing(["install-tldr"]);
        let mut report = Report::new();

        install_tools(&target, &tools, &mut shell, &mut report)?;

        assert_eq!(shell.calls, vec!["sh install-tldr.sh", "sh install-kubectl.sh"]);
        assert_eq!(report.outcome("nvm"), Some(&StepOutcome::skipped("already installed")));
        assert!(matches!(report.outcome("tldr"), Some(StepOutcome::Failed(_))));
        assert_eq!(report.outcome("kubectl"), Some(&StepOutcome::Done));

        Ok(())
    }

    #[sealed_test]
    fn install_font_stops_at_first_failure() -> anyhow::Result<()> {
        let target = Target::new("jdoe", std::env::current_dir()?);
        let font = FontSource {
            name: "Mono".into(),
            url: "https://blah.org/Mono.zip".into(),
            destination: HomePath::new(".local/share/fonts/Mono"),
        };
        let mut shell = RecordingShell::failing(["unzip"]);
        let mut report = Report::new();

        install_font(&target, Some(&font), &mut shell, &mut report)?;

        assert_eq!(shell.calls.len(), 2);
        assert!(shell.calls[0].starts_with("curl -fsSL -o"));
        assert!(matches!(report.outcome("font Mono"), Some(StepOutcome::Failed(_))));

        let archive = Path::new(shell.calls[0].split_whitespace().nth(3).unwrap_or_default());
        let staging = archive.parent().unwrap_or(archive);
        assert_eq!(archive.file_name(), Some(OsStr::new("Mono.zip")));
        assert_ne!(staging, std::env::temp_dir());
        assert!(!staging.exists());
        assert!(!target.home().join(".local/share/fonts/Mono").exists());

        Ok(())
    }

    struct FakeFetcher {
        fetched: Vec<String>,
    }

    impl PluginFetch for FakeFetcher {
        fn fetch(&mut self, plugin: &PluginSource, destination: &Path) -> FetchResult<()> {
            self.fetched.push(plugin.name.clone());
            create_dir_all(destination).map_err(|err| git2::Error::from_str(&err.to_string()))?;
            if plugin.url.is_empty() {
                return Err(FetchError::Git2(git2::Error::from_str("no url")));
            }
            Ok(())
        }
    }

    #[sealed_test]
    fn clone_plugins_skips_present_destinations() -> anyhow::Result<()> {
        let home = std::env::current_dir()?;
        create_dir_all(home.join(".zsh/autosuggestions"))?;
        let target = Target::new("jdoe", &home);
        let plugin = |name: &str, url: &str| PluginSource {
            name: name.into(),
            url: url.into(),
            branch: None,
            destination: HomePath::new(format!(".zsh/{name}")),
        };
        let plugins = vec![
            plugin("autosuggestions", "https://blah.org/a.git"),
            plugin("highlighting", "https://blah.org/h.git"),
            plugin("broken", ""),
        ];
        let mut fetcher = FakeFetcher { fetched: Vec::new() };
        let mut report = Report::new();

        clone_plugins(&target, &plugins, &mut fetcher, &mut report)?;

        assert_eq!(fetcher.fetched, vec!["highlighting", "broken"]);
        assert_eq!(
            report.outcome("plugin autosuggestions"),
            Some(&StepOutcome::skipped("already cloned"))
        );
        assert_eq!(report.outcome("plugin highlighting"), Some(&StepOutcome::Done));
        assert!(matches!(report.outcome("plugin broken"), Some(StepOutcome::Failed(_))));
        assert!(home.join(".zsh/highlighting").is_dir());
        assert!(!home.join(".zsh/broken").exists());

        Ok(())
    }

    #[sealed_test(env = [("DOTSTRAP_SHELL", "/nonexistent/zsh")])]
    fn declined_shell_change_resolves_nothing() -> anyhow::Result<()> {
        let target = Target::new("dotstrap-no-such-user", std::env::current_dir()?);
        let shell = ShellSettings { name: "zsh".into() };
        let mut syscall = RecordingShell::default();
        let mut report = Report::new();

        change_login_shell(
            &target,
            Some(&shell),
            &mut syscall,
            &mut Unattended::AssumeNo,
            &mut report,
        )?;

        assert!(syscall.calls.is_empty());
        assert_eq!(report.outcome("login shell zsh"), Some(&StepOutcome::skipped("declined")));

        Ok(())
    }

    #[sealed_test(env = [("DOTSTRAP_SHELL", "/nonexistent/zsh")])]
    fn confirmed_shell_change_aborts_on_unresolved_shell() -> anyhow::Result<()> {
        let target = Target::new("dotstrap-no-such-user", std::env::current_dir()?);
        let shell = ShellSettings { name: "zsh".into() };
        let mut syscall = RecordingShell::default();
        let mut report = Report::new();

        let result = change_login_shell(
            &target,
            Some(&shell),
            &mut syscall,
            &mut Unattended::AssumeYes,
            &mut report,
        );

        assert!(matches!(result, Err(ToolchainError::UnresolvedShell(_))));
        assert!(syscall.calls.is_empty());

        Ok(())
    }

    #[sealed_test]
    fn confirmed_shell_change_runs_chsh() -> anyhow::Result<()> {
        let fake_shell = std::env::current_dir()?.join("zsh");
        std::fs::write(&fake_shell, "")?;
        std::env::set_var(SHELL_OVERRIDE_VAR, &fake_shell);
        let target = Target::new("dotstrap-no-such-user", std::env::current_dir()?);
        let shell = ShellSettings { name: "zsh".into() };
        let mut syscall = RecordingShell::default();
        let mut report = Report::new();

        change_login_shell(
            &target,
            Some(&shell),
            &mut syscall,
            &mut Unattended::AssumeYes,
            &mut report,
        )?;

        assert_eq!(
            syscall.calls,
            vec![format!("chsh -s {} dotstrap-no-such-user", fake_shell.display())]
        );
        assert_eq!(report.outcome("login shell zsh"), Some(&StepOutcome::Done));

        Ok(())
    }
}
