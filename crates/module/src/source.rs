//! Where a watcher module comes from

use crate::error::BindError;
use crate::native::BuiltinOptions;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::debug;

/// Location of the watcher module to bind
#[derive(Debug, Clone)]
pub enum ModuleSource {
    /// In-process `notify` backend
    Builtin(BuiltinOptions),
    /// Shared library already on disk
    Path(PathBuf),
    /// Library bytes packaged into the host binary
    ///
    /// Extracted to the temp directory before loading. The extracted file
    /// is left behind for the OS to reclaim.
    Embedded {
        file_name: String,
        bytes: &'static [u8],
    },
}

impl ModuleSource {
    /// Options for the built-in backend, if this source selects it
    pub fn builtin_options(&self) -> Option<&BuiltinOptions> {
        match self {
            ModuleSource::Builtin(options) => Some(options),
            _ => None,
        }
    }

    /// Resolve a library source to a loadable file on disk
    ///
    /// Returns `None` for the built-in backend, which needs no file.
    pub fn materialize(&self) -> Result<Option<PathBuf>, BindError> {
        match self {
            ModuleSource::Builtin(_) => Ok(None),
            ModuleSource::Path(path) => {
                if !path.is_file() {
                    return Err(BindError::ModuleMissing { path: path.clone() });
                }
                Ok(Some(path.clone()))
            }
            ModuleSource::Embedded { file_name, bytes } => {
                let target = std::env::temp_dir().join(file_name);
                if bytes.is_empty() {
                    return Err(BindError::ModuleMissing { path: target });
                }
                extract(&target, bytes)?;
                Ok(Some(target))
            }
        }
    }
}

/// Write an embedded payload to `target`, failing cleanly on any I/O error
fn extract(target: &Path, bytes: &[u8]) -> Result<(), BindError> {
    let to_err = |e: std::io::Error| BindError::Extraction {
        path: target.to_path_buf(),
        reason: e.to_string(),
    };

    let mut file = fs::File::create(target).map_err(to_err)?;
    file.write_all(bytes).map_err(to_err)?;
    file.sync_all().map_err(to_err)?;

    debug!("Extracted {} byte module payload to {}", bytes.len(), target.display());
    Ok(())
}

impl FromStr for ModuleSource {
    type Err = std::convert::Infallible;

    /// `"builtin"` selects the in-process backend; anything else is a library path
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("builtin") {
            Ok(ModuleSource::Builtin(BuiltinOptions::default()))
        } else {
            Ok(ModuleSource::Path(PathBuf::from(trimmed)))
        }
    }
}

impl std::fmt::Display for ModuleSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ModuleSource::Builtin(_) => write!(f, "builtin"),
            ModuleSource::Path(path) => write!(f, "{}", path.display()),
            ModuleSource::Embedded { file_name, .. } => write!(f, "embedded:{}", file_name),
        }
    }
}
