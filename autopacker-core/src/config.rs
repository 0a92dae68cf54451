//! Working-directory resolution and the optional `autopacker.yaml`.
//!
//! # Layout
//!
//! ```text
//! <game>/
//!   Mods/                     working root (watched)
//!     autopacker.yaml         optional overrides for [`Conventions`]
//!     <mod>/Data/<x>.unpacked
//!   Mods-Dev/Release/         default release root
//! ```
//!
//! Every function takes explicit paths so tests can run against a `TempDir`.

use std::path::{Path, PathBuf};

use crate::error::{io_err, ConfigError};
use crate::report::ErrorVerbosity;
use crate::types::Conventions;

pub const SETTINGS_FILE: &str = "autopacker.yaml";

/// `<root>/autopacker.yaml` — pure, no I/O.
pub fn settings_path_at(root: &Path) -> PathBuf {
    root.join(SETTINGS_FILE)
}

/// Load conventions from `<root>/autopacker.yaml`, or defaults when absent.
///
/// Returns `ConfigError::Parse` (with path) if the YAML is malformed.
pub fn load_conventions_at(root: &Path) -> Result<Conventions, ConfigError> {
    let path = settings_path_at(root);
    if !path.exists() {
        return Ok(Conventions::default());
    }
    let contents = std::fs::read_to_string(&path).map_err(|e| io_err(&path, e))?;
    if contents.trim().is_empty() {
        return Ok(Conventions::default());
    }
    serde_yaml::from_str(&contents).map_err(|e| ConfigError::Parse { path, source: e })
}

/// Absolute working directory, checked against the mod root name.
///
/// The directory has to lie inside a folder named `root_folder` unless
/// `any_folder` is set.
pub fn resolve_working_dir(
    dir: &Path,
    root_folder: &str,
    any_folder: bool,
) -> Result<PathBuf, ConfigError> {
    let absolute = std::fs::canonicalize(dir).map_err(|e| io_err(dir, e))?;
    if any_folder || is_inside_root_folder(&absolute, root_folder) {
        Ok(absolute)
    } else {
        Err(ConfigError::OutsideModRoot {
            path: absolute,
            root_folder: root_folder.to_string(),
        })
    }
}

/// Explicit release directory, or `<parent of working dir>/<release_folder>`.
pub fn resolve_release_dir(
    working_dir: &Path,
    explicit: Option<&Path>,
    conventions: &Conventions,
) -> PathBuf {
    match explicit {
        Some(dir) => dir.to_path_buf(),
        None => working_dir
            .parent()
            .unwrap_or(working_dir)
            .join(&conventions.release_folder),
    }
}

fn is_inside_root_folder(path: &Path, root_folder: &str) -> bool {
    path.components().any(|component| {
        component
            .as_os_str()
            .to_string_lossy()
            .eq_ignore_ascii_case(root_folder)
    })
}

// ---------------------------------------------------------------------------
// Settings
// ---------------------------------------------------------------------------

/// Operator-supplied inputs, typically straight from the command line.
#[derive(Debug, Clone, Default)]
pub struct SettingsOptions {
    pub working_dir: PathBuf,
    pub release_dir: Option<PathBuf>,
    pub any_folder: bool,
    pub print_error_stack: bool,
    pub pack_original: bool,
}

/// Fully resolved settings handed to every component at construction.
#[derive(Debug, Clone)]
pub struct Settings {
    pub working_dir: PathBuf,
    pub release_dir: PathBuf,
    pub conventions: Conventions,
    pub any_folder: bool,
    pub verbosity: ErrorVerbosity,
}

impl Settings {
    pub fn resolve(options: SettingsOptions) -> Result<Self, ConfigError> {
        let probe = std::fs::canonicalize(&options.working_dir)
            .map_err(|e| io_err(&options.working_dir, e))?;
        let mut conventions = load_conventions_at(&probe)?;
        if options.pack_original {
            conventions.pack_original = true;
        }

        let working_dir =
            resolve_working_dir(&probe, &conventions.root_folder, options.any_folder)?;
        let release_dir =
            resolve_release_dir(&working_dir, options.release_dir.as_deref(), &conventions);

        Ok(Self {
            working_dir,
            release_dir,
            conventions,
            any_folder: options.any_folder,
            verbosity: ErrorVerbosity::from_flag(options.print_error_stack),
        })
    }
}
