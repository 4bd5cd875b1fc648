//! Kernelspec generation and installation.
//!
//! Jupyter discovers kernels through `kernels/<name>/kernel.json` under its
//! data directories. The spec records how to launch this binary.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::Serialize;

pub const DEFAULT_KERNEL_NAME: &str = "peroxide";

/// Contents of `kernel.json`.
#[derive(Debug, Clone, Serialize)]
pub struct KernelSpec {
    pub argv: Vec<String>,
    pub display_name: String,
    pub language: String,
}

impl KernelSpec {
    /// Spec launching `exe`, optionally pinning the interpreter path.
    pub fn new(exe: &Path, interpreter: Option<&Path>) -> Self {
        let mut argv = vec![
            exe.display().to_string(),
            "run".to_string(),
            "--connection-file".to_string(),
            "{connection_file}".to_string(),
        ];
        if let Some(interpreter) = interpreter {
            argv.push("--interpreter".to_string());
            argv.push(interpreter.display().to_string());
        }

        Self {
            argv,
            display_name: "Peroxide Scheme".to_string(),
            language: "scheme".to_string(),
        }
    }

    /// Spec launching the running executable.
    pub fn for_current_exe(interpreter: Option<&Path>) -> anyhow::Result<Self> {
        let exe = std::env::current_exe().context("Failed to locate the kernel executable")?;
        Ok(Self::new(&exe, interpreter))
    }
}

/// Where to install the kernelspec.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// System-wide Jupyter data directory.
    System,
    /// Per-user Jupyter data directory.
    User,
    /// `<prefix>/share/jupyter`, e.g. a virtualenv.
    Prefix(PathBuf),
}

impl Target {
    /// Jupyter data directory for this target.
    pub fn data_dir(&self) -> anyhow::Result<PathBuf> {
        match self {
            Target::System => Ok(system_data_dir()),
            Target::User => user_data_dir(),
            Target::Prefix(prefix) => Ok(prefix.join("share").join("jupyter")),
        }
    }
}

fn user_data_dir() -> anyhow::Result<PathBuf> {
    if let Some(dir) = std::env::var_os("JUPYTER_DATA_DIR") {
        return Ok(PathBuf::from(dir));
    }

    if cfg!(target_os = "macos") {
        let home = dirs::home_dir().context("Cannot determine the home directory")?;
        return Ok(home.join("Library").join("Jupyter"));
    }

    let data = dirs::data_dir().context("Cannot determine the user data directory")?;
    Ok(data.join("jupyter"))
}

#[cfg(windows)]
fn system_data_dir() -> PathBuf {
    let program_data =
        std::env::var_os("PROGRAMDATA").unwrap_or_else(|| "C:\\ProgramData".into());
    PathBuf::from(program_data).join("jupyter")
}

#[cfg(not(windows))]
fn system_data_dir() -> PathBuf {
    PathBuf::from("/usr/local/share/jupyter")
}

/// Write `kernel.json` for kernel `name` and return its directory.
pub fn execute(target: Target, name: &str, interpreter: Option<&Path>) -> anyhow::Result<PathBuf> {
    if name.is_empty() || name.contains(['/', '\\']) {
        anyhow::bail!("Invalid kernel name: '{}'", name);
    }

    let spec = KernelSpec::for_current_exe(interpreter)?;
    let dir = target.data_dir()?.join("kernels").join(name);
    write_spec(&dir, &spec)?;
    Ok(dir)
}

fn write_spec(dir: &Path, spec: &KernelSpec) -> anyhow::Result<()> {
    fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create {}", dir.display()))?;

    let path = dir.join("kernel.json");
    let json = serde_json::to_string_pretty(spec)?;
    fs::write(&path, json).with_context(|| format!("Failed to write {}", path.display()))?;

    tracing::info!("Wrote kernelspec to {}", path.display());
    Ok(())
}
