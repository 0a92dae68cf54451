pub mod release;
pub mod sync;
pub mod watch;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use autopacker_core::config::{Settings, SettingsOptions};

/// Working-root options shared by every command.
#[derive(Args, Debug, Clone, Default)]
pub struct RootArgs {
    /// Mod root to work on (the game's `Mods` folder).
    #[arg(default_value = ".")]
    pub dir: PathBuf,

    /// Allow a working directory outside the `Mods` folder.
    #[arg(long)]
    pub any_folder: bool,

    /// Where release zips go [default: <game>/Mods-Dev/Release].
    #[arg(long, value_name = "DIR")]
    pub release_dir: Option<PathBuf>,

    /// Print the full cause chain of sync errors.
    #[arg(long)]
    pub print_error_stack: bool,

    /// Keep `.original` backup files inside archives.
    #[arg(long)]
    pub pack_original: bool,
}

impl RootArgs {
    pub fn resolve(&self) -> Result<Settings> {
        Settings::resolve(SettingsOptions {
            working_dir: self.dir.clone(),
            release_dir: self.release_dir.clone(),
            any_folder: self.any_folder,
            print_error_stack: self.print_error_stack,
            pack_original: self.pack_original,
        })
        .with_context(|| format!("invalid working directory '{}'", self.dir.display()))
    }
}
