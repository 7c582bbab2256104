//! Build backends: the external programs that render a configuration's
//! `conf/` tree from a template and fragments.
//!
//! The materializer only talks to [`BuildBackend`]; [`BitbakeBackend`] is the
//! shipped implementation.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::process::Command;

use crate::error::BackendError;

/// Contract between the materializer and a build system.
pub trait BuildBackend {
    /// Short name used in log lines.
    fn name(&self) -> &str;

    /// Variable the environment file exports, pointing at the build subtree.
    fn env_var(&self) -> &str;

    /// The environment file a build subtree's scripts source.
    fn env_file(&self, build_dir: &Path) -> PathBuf {
        build_dir.join("init-build-env")
    }

    /// Render `<build_dir>/conf/` and the environment file from `template`.
    fn setup(&self, layers: &[PathBuf], template: &str, build_dir: &Path)
        -> Result<(), BackendError>;

    /// Apply one configuration fragment to an already set up `build_dir`.
    fn enable_fragment(
        &self,
        layers: &[PathBuf],
        fragment: &str,
        build_dir: &Path,
    ) -> Result<(), BackendError>;
}

/// `oe-setup-build` + `bitbake-config-build`.
#[derive(Debug, Clone)]
pub struct BitbakeBackend {
    pub setup_program: String,
    pub config_program: String,
}

impl Default for BitbakeBackend {
    fn default() -> Self {
        Self {
            setup_program: "oe-setup-build".to_string(),
            config_program: "bitbake-config-build".to_string(),
        }
    }
}

impl BuildBackend for BitbakeBackend {
    fn name(&self) -> &str {
        "bitbake"
    }

    fn env_var(&self) -> &str {
        "BBPATH"
    }

    fn setup(
        &self,
        layers: &[PathBuf],
        template: &str,
        build_dir: &Path,
    ) -> Result<(), BackendError> {
        let program = locate(&self.setup_program, layers)?;
        let mut cmd = Command::new(&program);
        cmd.arg("setup")
            .arg("-c")
            .arg(template)
            .arg("-b")
            .arg(build_dir)
            .arg("--no-shell");
        run(&mut cmd)?;

        for expected in [build_dir.join("conf"), self.env_file(build_dir)] {
            if !expected.exists() {
                return Err(BackendError::MissingOutput {
                    program: self.setup_program.clone(),
                    expected,
                });
            }
        }
        Ok(())
    }

    fn enable_fragment(
        &self,
        layers: &[PathBuf],
        fragment: &str,
        build_dir: &Path,
    ) -> Result<(), BackendError> {
        let program = locate(&self.config_program, layers)?;
        // The config tool finds the build through the environment file's
        // exports, so it has to run inside a shell that sourced it.
        let mut cmd = Command::new("sh");
        cmd.current_dir(build_dir)
            .arg("-c")
            .arg(r#". ./init-build-env && exec "$0" "$@""#)
            .arg(&program)
            .arg("enable-fragment")
            .arg(fragment);
        run(&mut cmd).map(|_| ())
    }
}

/// Find `program` in each layer's `scripts/` then `bin/`, in layer order,
/// falling back to `PATH`. The result is always an absolute path.
pub fn locate(program: &str, layers: &[PathBuf]) -> Result<PathBuf, BackendError> {
    for layer in layers {
        for sub in ["scripts", "bin"] {
            let candidate = layer.join(sub).join(program);
            if candidate.is_file() {
                return std::path::absolute(&candidate).map_err(|source| BackendError::Spawn {
                    command: candidate.display().to_string(),
                    source,
                });
            }
        }
    }
    which::which(program).map_err(|_| BackendError::ProgramNotFound {
        program: program.to_string(),
    })
}

/// Validate and re-quote a target command line for a generated script.
pub fn quote_target(target: &str) -> Result<String, BackendError> {
    let invalid = |reason: &str| BackendError::InvalidTarget {
        target: target.to_string(),
        reason: reason.to_string(),
    };
    let words = shell_words::split(target).map_err(|e| invalid(&e.to_string()))?;
    if words.is_empty() {
        return Err(invalid("empty command"));
    }
    Ok(shell_words::join(words))
}

fn run(cmd: &mut Command) -> Result<String, BackendError> {
    let rendered = render(cmd);
    tracing::debug!("running {rendered}");
    let output = cmd.output().map_err(|source| BackendError::Spawn {
        command: rendered.clone(),
        source,
    })?;
    if !output.status.success() {
        return Err(BackendError::Failed {
            command: rendered,
            status: output.status.to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

fn render(cmd: &Command) -> String {
    std::iter::once(cmd.get_program())
        .chain(cmd.get_args())
        .map(OsStr::to_string_lossy)
        .collect::<Vec<_>>()
        .join(" ")
}
