use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Setup failures. Child exit codes are not errors; they are returned as
/// plain codes by the runner.
#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("could not determine the current directory: {0}")]
    CurrentDir(#[source] io::Error),

    #[error(
        "no build output directory found under {} (tried {tried}); set ELECTRON_OUT_DIR",
        .out.display()
    )]
    OutDirNotFound { out: PathBuf, tried: String },

    #[error("failed to list test files in {}", .dir.display())]
    ListTests {
        dir: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to spawn {program} for the {phase} phase")]
    Spawn {
        phase: &'static str,
        program: String,
        #[source]
        source: io::Error,
    },
}
