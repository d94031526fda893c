// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! External process execution.
//!
//! Package managers, download tools, archive extractors, and friends are all
//! driven as external processes. Each call is described by an [`Invocation`]
//! and executed through the [`Syscall`] trait, which keeps the orchestration
//! logic independent of the machine it runs on.

use crate::path::Target;

use indicatif::{ProgressBar, ProgressStyle};
use std::{
    env::{split_paths, var_os},
    ffi::{OsStr, OsString},
    fmt::{Display, Formatter, Result as FmtResult},
    path::PathBuf,
    process::Command,
    time::Duration,
};
use tracing::{debug, instrument};

/// Description of an external process call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    program: OsString,
    args: Vec<OsString>,
    envs: Vec<(OsString, OsString)>,
    interactive: bool,
}

impl Invocation {
    /// Construct new invocation of program.
    pub fn new(program: impl Into<OsString>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            envs: Vec::new(),
            interactive: false,
        }
    }

    /// Construct new invocation from argument vector.
    ///
    /// # Errors
    ///
    /// - Return [`SyscallError::EmptyCommand`] if argument vector is empty.
    pub fn from_argv(argv: impl IntoIterator<Item = impl Into<OsString>>) -> Result<Self> {
        let mut argv = argv.into_iter().map(Into::into);
        let program = argv.next().ok_or(SyscallError::EmptyCommand)?;

        Ok(Self::new(program).args(argv))
    }

    /// Append argument.
    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Append arguments.
    pub fn args(mut self, args: impl IntoIterator<Item = impl Into<OsString>>) -> Self {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Set environment variable for process.
    pub fn env(mut self, key: impl Into<OsString>, value: impl Into<OsString>) -> Self {
        self.envs.push((key.into(), value.into()));
        self
    }

    /// Hand terminal over to process instead of capturing its output.
    pub fn interactive(mut self) -> Self {
        self.interactive = true;
        self
    }

    /// Run as target account when current process runs on its behalf.
    ///
    /// Environment variables are passed through sudo as assignments, since
    /// sudo resets the environment of the command it runs.
    pub fn as_user(self, target: &Target) -> Self {
        if target.owner().is_none() {
            return self;
        }

        let mut wrapped = Self::new("sudo")
            .args(["-u", target.user(), "-H", "--"])
            .arg("env");
        for (key, value) in &self.envs {
            let mut assignment = key.clone();
            assignment.push("=");
            assignment.push(value);
            wrapped = wrapped.arg(assignment);
        }
        wrapped = wrapped.arg(self.program).args(self.args);
        wrapped.interactive = self.interactive;

        wrapped
    }

    /// Run with superuser privileges, escalating through sudo if needed.
    pub fn privileged(self, target: &Target) -> Self {
        if target.is_privileged() {
            return self;
        }

        let mut wrapped = Self::new("sudo").arg(self.program).args(self.args);
        wrapped.envs = self.envs;
        wrapped.interactive = self.interactive;

        wrapped
    }

    /// Name of program to execute.
    pub fn program(&self) -> &OsStr {
        self.program.as_os_str()
    }

    /// Arguments passed to program.
    pub fn get_args(&self) -> &[OsString] {
        self.args.as_slice()
    }

    pub fn is_interactive(&self) -> bool {
        self.interactive
    }

    fn to_command(&self) -> Command {
        let mut command = Command::new(&self.program);
        command.args(&self.args);
        command.envs(self.envs.iter().map(|(key, value)| (key, value)));
        command
    }
}

impl Display for Invocation {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        fmt.write_str(&self.program.to_string_lossy())?;
        for arg in &self.args {
            write!(fmt, " {}", arg.to_string_lossy())?;
        }

        Ok(())
    }
}

/// Layer of indirection for running external processes.
pub trait Syscall {
    /// Run invocation to completion.
    ///
    /// Returns combined output of non-interactive invocations.
    fn run(&mut self, invocation: &Invocation) -> Result<String>;
}

/// Run external processes on the current machine.
///
/// Non-interactive processes get a spinner while the caller waits on them.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemShell;

impl Syscall for SystemShell {
    #[instrument(skip(self, invocation), level = "debug")]
    fn run(&mut self, invocation: &Invocation) -> Result<String> {
        debug!("run {invocation}");
        if invocation.is_interactive() {
            syscall_interactive(invocation)?;
            return Ok(String::new());
        }

        let style = ProgressStyle::with_template("{spinner:.green} {elapsed:.yellow}  {msg}")?;
        let bar = ProgressBar::new_spinner().with_style(style);
        bar.set_message(invocation.to_string());
        bar.enable_steady_tick(Duration::from_millis(100));
        let result = syscall_non_interactive(invocation);
        bar.finish_and_clear();

        result
    }
}

/// Locate program on `PATH`.
pub fn find_program(name: impl AsRef<OsStr>) -> Option<PathBuf> {
    let paths = var_os("PATH")?;
    split_paths(&paths)
        .map(|dir| dir.join(name.as_ref()))
        .find(|path| path.is_file())
}

fn syscall_interactive(invocation: &Invocation) -> Result<()> {
    let status = invocation
        .to_command()
        .spawn()
        .map_err(|err| SyscallError::Spawn {
            source: err,
            program: invocation.program.clone(),
        })?
        .wait()
        .map_err(|err| SyscallError::Spawn {
            source: err,
            program: invocation.program.clone(),
        })?;

    if !status.success() {
        return Err(SyscallError::Failed {
            program: invocation.program.clone(),
            message: status.to_string(),
        });
    }

    Ok(())
}

fn syscall_non_interactive(invocation: &Invocation) -> Result<String> {
    let output = invocation
        .to_command()
        .output()
        .map_err(|err| SyscallError::Spawn {
            source: err,
            program: invocation.program.clone(),
        })?;
    let stdout = String::from_utf8_lossy(output.stdout.as_slice()).into_owned();
    let stderr = String::from_utf8_lossy(output.stderr.as_slice()).into_owned();
    let mut message = String::new();

    if !stdout.is_empty() {
        message.push_str(format!("stdout: {stdout}").as_str());
    }

    if !stderr.is_empty() {
        message.push_str(format!("stderr: {stderr}").as_str());
    }

    // INVARIANT: Chomp trailing newlines.
    let message = message
        .strip_suffix("\r\n")
        .or(message.strip_suffix('\n'))
        .map(ToString::to_string)
        .unwrap_or(message);

    if !output.status.success() {
        return Err(SyscallError::Failed {
            program: invocation.program.clone(),
            message: format!("{}\n{message}", output.status),
        });
    }

    Ok(message)
}

/// External process error types.
#[derive(Debug, thiserror::Error)]
pub enum SyscallError {
    /// Invocation without program.
    #[error("cannot run empty command")]
    EmptyCommand,

    /// Process cannot be started or waited on.
    #[error("failed to run {program:?}")]
    Spawn {
        #[source]
        source: std::io::Error,
        program: OsString,
    },

    /// Process exits unsuccessfully.
    #[error("command {program:?} failed: {message}")]
    Failed { program: OsString, message: String },

    /// Style template cannot be set for spinner.
    #[error(transparent)]
    IndicatifStyleTemplate(#[from] indicatif::style::TemplateError),
}

/// Friendly result alias :3
pub type Result<T, E = SyscallError> = std::result::Result<T, E>;
