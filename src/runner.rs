//! The build → install → test pipeline.
//!
//! Each phase is described by an [`Invocation`], handed to a [`Launcher`] and
//! awaited. A non-zero exit code stops the pipeline and becomes the result of
//! the run.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::process::ExitStatus;

use serde::Serialize;
use tokio::process::Command;
use tracing::{debug, error, info, warn};

use crate::config::{EnvMap, RunnerConfig, YARN_VERSION};
use crate::error::RunnerError;
use crate::selection;

const TAP: &str = "node_modules/.bin/tap";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Build,
    Install,
    Test,
}

impl Phase {
    pub fn name(self) -> &'static str {
        match self {
            Phase::Build => "build",
            Phase::Install => "install",
            Phase::Test => "test",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One child process, fully described.
#[derive(Debug, Clone, Serialize)]
pub struct Invocation {
    pub phase: Phase,
    pub program: PathBuf,
    pub args: Vec<String>,
    pub cwd: PathBuf,
    /// Variables set on top of the ambient environment, for display.
    pub added_env: BTreeMap<String, String>,
    #[serde(skip)]
    pub env: EnvMap,
}

/// All three invocations, with the test list resolved up front. Used for
/// `--dry-run`; a real run lists the tests only once install has succeeded.
#[derive(Debug, Serialize)]
pub struct Plan {
    pub build: Invocation,
    pub install: Invocation,
    pub test: Invocation,
    pub tests: Vec<String>,
}

impl Plan {
    pub fn new(config: &RunnerConfig, tests: Vec<String>) -> Self {
        Plan {
            build: build_invocation(config),
            install: install_invocation(config),
            test: test_invocation(config, &tests),
            tests,
        }
    }
}

pub fn build_invocation(config: &RunnerConfig) -> Invocation {
    Invocation {
        phase: Phase::Build,
        program: PathBuf::from(config.platform.npx()),
        args: ["node-gyp", "rebuild", "--verbose", "--directory", "test", "-j", "max"]
            .iter()
            .map(|s| s.to_string())
            .collect(),
        cwd: config.nan_dir(),
        added_env: display_env(&config.build_overrides()),
        env: config.build_env(),
    }
}

pub fn install_invocation(config: &RunnerConfig) -> Invocation {
    Invocation {
        phase: Phase::Install,
        program: PathBuf::from(config.platform.npx()),
        args: vec![format!("yarn@{}", YARN_VERSION), "install".to_string()],
        cwd: config.nan_dir(),
        added_env: display_env(&config.build_overrides()),
        env: config.build_env(),
    }
}

pub fn test_invocation(config: &RunnerConfig, tests: &[String]) -> Invocation {
    let mut args = vec![TAP.to_string()];
    args.extend(tests.iter().map(|t| format!("test/js/{}", t)));
    Invocation {
        phase: Phase::Test,
        program: config.electron_exec(),
        args,
        cwd: config.nan_dir(),
        added_env: display_env(&config.test_overrides()),
        env: config.test_env(),
    }
}

/// Test files to hand to the harness: the listing of the test directory,
/// narrowed by `only`.
pub fn select_tests(
    config: &RunnerConfig,
    only: Option<&[String]>,
) -> Result<Vec<String>, RunnerError> {
    let files = selection::list_test_files(&config.test_dir())?;
    Ok(selection::select(&files, only))
}

fn display_env(vars: &[(&'static str, std::ffi::OsString)]) -> BTreeMap<String, String> {
    vars.iter()
        .map(|(k, v)| (k.to_string(), v.to_string_lossy().into_owned()))
        .collect()
}

/// Starts a child process and waits for it to exit.
pub trait Launcher {
    async fn launch(&self, invocation: &Invocation) -> Result<i32, RunnerError>;
}

/// Spawns real processes with inherited stdio.
pub struct ProcessLauncher;

impl Launcher for ProcessLauncher {
    async fn launch(&self, invocation: &Invocation) -> Result<i32, RunnerError> {
        debug!(
            "{} phase: {} {}",
            invocation.phase,
            invocation.program.display(),
            invocation.args.join(" ")
        );
        let status = Command::new(&invocation.program)
            .args(&invocation.args)
            .current_dir(&invocation.cwd)
            .env_clear()
            .envs(&invocation.env)
            .status()
            .await
            .map_err(|source| RunnerError::Spawn {
                phase: invocation.phase.name(),
                program: invocation.program.display().to_string(),
                source,
            })?;
        Ok(exit_code(status))
    }
}

/// Exit code to forward for a finished child. Signals map to `128 + signo`.
pub fn exit_code(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }
    1
}

/// Run the three phases in order, stopping at the first non-zero exit code.
/// Test files are listed only after install succeeds.
pub async fn run<L: Launcher>(
    config: &RunnerConfig,
    only: Option<&[String]>,
    launcher: &L,
) -> Result<i32, RunnerError> {
    let build = build_invocation(config);
    info!("building nan test modules in {}", build.cwd.display());
    let code = launcher.launch(&build).await?;
    if code != 0 {
        error!("Failed to build nan test modules");
        return Ok(code);
    }

    info!("installing nan node_modules with yarn@{}", YARN_VERSION);
    let code = launcher.launch(&install_invocation(config)).await?;
    if code != 0 {
        error!("Failed to install nan node_modules");
        return Ok(code);
    }

    let tests = select_tests(config, only)?;
    if tests.is_empty() {
        warn!("no nan tests selected");
    }
    info!("running {} nan test file(s)", tests.len());
    let code = launcher.launch(&test_invocation(config, &tests)).await?;
    if code != 0 {
        error!("nan tests exited with code {}", code);
    }
    Ok(code)
}
