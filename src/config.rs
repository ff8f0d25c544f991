//! Run configuration: platform detection, output directory resolution and the
//! environment handed to each child process.
//!
//! Everything here is computed once up front into a [`RunnerConfig`]; the
//! process environment of the runner itself is never modified.

use std::collections::BTreeMap;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

use tracing::info;

use crate::error::RunnerError;

/// Pinned yarn used for `npx yarn@<version> install`.
pub const YARN_VERSION: &str = "1.15.2";

/// Build output directories probed, in order, when none is given explicitly.
pub const PRESET_OUT_DIRS: [&str; 4] = ["Testing", "Release", "Default", "Debug"];

pub type EnvMap = BTreeMap<OsString, OsString>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Platform {
    Darwin,
    Linux,
    Windows,
    Other,
}

impl Platform {
    pub fn current() -> Self {
        if cfg!(target_os = "macos") {
            Platform::Darwin
        } else if cfg!(target_os = "linux") {
            Platform::Linux
        } else if cfg!(windows) {
            Platform::Windows
        } else {
            Platform::Other
        }
    }

    pub fn npx(self) -> &'static str {
        match self {
            Platform::Windows => "npx.cmd",
            _ => "npx",
        }
    }

    /// Path of the Electron binary inside a build output directory.
    pub fn electron_exec(self, out_path: &Path) -> PathBuf {
        match self {
            Platform::Darwin => out_path
                .join("Electron.app")
                .join("Contents")
                .join("MacOS")
                .join("Electron"),
            Platform::Windows => out_path.join("electron.exe"),
            Platform::Linux | Platform::Other => out_path.join("electron"),
        }
    }
}

/// Pick the build output directory name.
///
/// An explicit name wins and is not checked for existence. Otherwise the first
/// preset directory present under `<src>/out` is used.
pub fn resolve_out_dir(src_dir: &Path, explicit: Option<&str>) -> Result<String, RunnerError> {
    if let Some(name) = explicit.filter(|n| !n.is_empty()) {
        info!("OUT_DIR is: {}", name);
        return Ok(name.to_string());
    }
    let out = src_dir.join("out");
    for name in PRESET_OUT_DIRS {
        if out.join(name).exists() {
            info!("OUT_DIR is: {}", name);
            return Ok(name.to_string());
        }
    }
    Err(RunnerError::OutDirNotFound {
        out,
        tried: PRESET_OUT_DIRS.join(", "),
    })
}

/// Compiler and linker overrides for the native addon build.
///
/// Linux builds with the bundled clang against libc++, matching Electron.
pub fn compiler_flags(
    platform: Platform,
    src_dir: &Path,
    out_path: &Path,
) -> Vec<(&'static str, OsString)> {
    match platform {
        Platform::Darwin => vec![
            ("CFLAGS", OsString::from("-std=c++17")),
            ("CXXFLAGS", OsString::from("-std=c++17")),
        ],
        Platform::Linux => {
            let libcxx = src_dir.join("buildtools").join("third_party").join("libc++");
            let libcxxabi = src_dir.join("buildtools").join("third_party").join("libc++abi");
            let cxxflags = [
                "-std=c++17".to_string(),
                "-nostdinc++".to_string(),
                format!("-isystem\"{}\"", libcxx.display()),
                format!("-isystem\"{}\"", libcxx.join("trunk").join("include").display()),
                format!("-isystem\"{}\"", libcxxabi.join("trunk").join("include").display()),
                "-fPIC".to_string(),
            ]
            .join(" ");

            let obj = out_path.join("obj").join("buildtools").join("third_party");
            let ldflags = [
                "-stdlib=libstdc++".to_string(),
                "-fuse-ld=lld".to_string(),
                format!("-L\"{}\"", obj.join("libc++abi").display()),
                format!("-L\"{}\"", obj.join("libc++").display()),
            ]
            .join(" ");

            let clang_dir = src_dir
                .join("third_party")
                .join("llvm-build")
                .join("Release+Asserts")
                .join("bin");

            vec![
                ("CC", clang_dir.join("clang").into_os_string()),
                ("CXX", clang_dir.join("clang++").into_os_string()),
                ("LD", clang_dir.join("lld").into_os_string()),
                ("CFLAGS", OsString::from(&cxxflags)),
                ("CXXFLAGS", OsString::from(cxxflags)),
                ("LDFLAGS", OsString::from(ldflags)),
            ]
        }
        Platform::Windows | Platform::Other => Vec::new(),
    }
}

/// Immutable description of one run.
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    pub platform: Platform,
    pub src_dir: PathBuf,
    pub out_dir: String,
    pub ambient: EnvMap,
}

impl RunnerConfig {
    pub fn new(platform: Platform, src_dir: PathBuf, out_dir: String, ambient: EnvMap) -> Self {
        Self { platform, src_dir, out_dir, ambient }
    }

    pub fn nan_dir(&self) -> PathBuf {
        self.src_dir.join("third_party").join("nan")
    }

    pub fn test_dir(&self) -> PathBuf {
        self.nan_dir().join("test").join("js")
    }

    pub fn out_path(&self) -> PathBuf {
        self.src_dir.join("out").join(&self.out_dir)
    }

    pub fn electron_exec(&self) -> PathBuf {
        self.platform.electron_exec(&self.out_path())
    }

    /// Variables added on top of the ambient environment for build and install.
    pub fn build_overrides(&self) -> Vec<(&'static str, OsString)> {
        let out_path = self.out_path();
        let mut vars = vec![
            ("npm_config_nodedir", out_path.join("gen").join("node_headers").into_os_string()),
            ("npm_config_msvs_version", OsString::from("2019")),
        ];
        // Omitted when unset.
        if let Some(arch) = self.ambient.get(&OsString::from("NPM_CONFIG_ARCH")) {
            vars.push(("npm_config_arch", arch.clone()));
        }
        vars.push(("npm_config_yes", OsString::from("true")));
        vars.extend(compiler_flags(self.platform, &self.src_dir, &out_path));
        vars
    }

    /// Variables added on top of the ambient environment for the test harness.
    pub fn test_overrides(&self) -> Vec<(&'static str, OsString)> {
        vec![("ELECTRON_RUN_AS_NODE", OsString::from("true"))]
    }

    pub fn build_env(&self) -> EnvMap {
        merge(&self.ambient, self.build_overrides())
    }

    pub fn test_env(&self) -> EnvMap {
        merge(&self.ambient, self.test_overrides())
    }
}

fn merge(ambient: &EnvMap, overrides: Vec<(&'static str, OsString)>) -> EnvMap {
    let mut env = ambient.clone();
    for (key, value) in overrides {
        env.insert(OsString::from(key), value);
    }
    env
}
