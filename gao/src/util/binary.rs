//! Locating the per-architecture sandbox executable.
//!
//! Executables are laid out as `<base_dir>/<arch>`, one file per CPU
//! architecture.

use gao_shared::errors::{GaoError, GaoResult};
use std::path::{Path, PathBuf};

/// CPU architectures a sandbox executable is built for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arch {
    X86_64,
    I386,
    Arm,
    Aarch64,
}

impl Arch {
    /// The architecture this crate was compiled for.
    pub fn current() -> GaoResult<Self> {
        Self::from_target(std::env::consts::ARCH)
    }

    /// Maps a Rust target architecture name.
    pub fn from_target(name: &str) -> GaoResult<Self> {
        match name {
            "x86_64" => Ok(Arch::X86_64),
            "x86" => Ok(Arch::I386),
            "arm" => Ok(Arch::Arm),
            "aarch64" => Ok(Arch::Aarch64),
            other => Err(GaoError::Unsupported(format!(
                "no sandbox executable for architecture {}",
                other
            ))),
        }
    }

    /// Subpath of the executable below the base directory.
    pub fn subpath(self) -> &'static str {
        match self {
            Arch::X86_64 => "x86_64",
            Arch::I386 => "i386",
            Arch::Arm => "arm",
            Arch::Aarch64 => "aarch64",
        }
    }
}

/// Path of the sandbox executable for the running architecture.
pub fn resolve_binary(base_dir: &Path) -> GaoResult<PathBuf> {
    Ok(base_dir.join(Arch::current()?.subpath()))
}
