//! Run options and runtime configuration.

use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

use clap::error::ErrorKind;
use clap::Parser;
use serde::Deserialize;

use crate::cli::Cli;
use crate::error::{ConfigFileError, Error, Result};

/// File extension of persisted executables.
pub const EXE_EXTENSION: &str = "poplar";

/// Validated options for a single run.
///
/// Only constructed through [`Options::resolve`] or [`Options::from_cli`], so
/// a value of this type always satisfies the save/load/profile constraints.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Options {
    devices: i32,
    con_task: i32,
    source: i32,
    dimensions: i32,
    use_ipu_model: bool,
    num_ipus: usize,
    exe_name: String,
    save_exe: bool,
    load_exe: bool,
    profile: bool,
    profile_name: PathBuf,
    config: Option<PathBuf>,
    verbose: bool,
}

impl Options {
    /// Parse and validate a full argument vector (program name first).
    ///
    /// `--help` prints the usage text to stdout and returns
    /// [`Error::UserRequestedHelp`].
    pub fn resolve<I, T>(args: I) -> Result<Self>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        let cli = match Cli::try_parse_from(args) {
            Ok(cli) => cli,
            Err(err) if err.kind() == ErrorKind::DisplayHelp => {
                println!("{}", err.render());
                return Err(Error::UserRequestedHelp);
            }
            Err(err) => return Err(Error::InvalidArgument(err.render().to_string())),
        };

        Self::from_cli(cli)
    }

    pub fn from_cli(cli: Cli) -> Result<Self> {
        if (cli.save_exe || cli.load_exe) && cli.exe_name.is_empty() {
            return Err(Error::MissingArtifactName);
        }

        if cli.load_exe && cli.profile {
            return Err(Error::IncompatibleOptions);
        }

        Ok(Self {
            devices: cli.devices,
            con_task: cli.con_task,
            source: cli.source,
            dimensions: cli.dimensions,
            use_ipu_model: cli.model,
            num_ipus: cli.ipus,
            exe_name: cli.exe_name,
            save_exe: cli.save_exe,
            load_exe: cli.load_exe,
            profile: cli.profile,
            profile_name: cli.profile_name,
            config: cli.config,
            verbose: cli.verbose,
        })
    }

    pub fn devices(&self) -> i32 {
        self.devices
    }

    pub fn con_task(&self) -> i32 {
        self.con_task
    }

    pub fn source(&self) -> i32 {
        self.source
    }

    pub fn dimensions(&self) -> i32 {
        self.dimensions
    }

    pub fn use_ipu_model(&self) -> bool {
        self.use_ipu_model
    }

    pub fn num_ipus(&self) -> usize {
        self.num_ipus
    }

    pub fn exe_name(&self) -> &str {
        &self.exe_name
    }

    pub fn save_exe(&self) -> bool {
        self.save_exe
    }

    pub fn load_exe(&self) -> bool {
        self.load_exe
    }

    pub fn profile(&self) -> bool {
        self.profile
    }

    pub fn profile_name(&self) -> &Path {
        &self.profile_name
    }

    pub fn config(&self) -> Option<&Path> {
        self.config.as_deref()
    }

    pub fn verbose(&self) -> bool {
        self.verbose
    }

    /// Path of the persisted executable for these options.
    pub fn exe_file_name(&self) -> PathBuf {
        exe_file_name(&self.exe_name)
    }
}

/// `<prefix>.poplar`
pub fn exe_file_name(prefix: &str) -> PathBuf {
    PathBuf::from(format!("{}.{}", prefix, EXE_EXTENSION))
}

/// Get the ipurun configuration directory.
pub fn config_dir() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(home).join(".config/ipurun")
}

/// Contents of a `config.toml`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub runtime: RuntimeConfig,
}

impl FileConfig {
    /// Load `path`, or the default config file if `path` is `None`.
    ///
    /// An explicit path must exist. A missing default file yields the
    /// built-in defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => {
                let default = config_dir().join("config.toml");
                if !default.exists() {
                    log::debug!("no config file at {}, using defaults", default.display());
                    return Ok(Self::default());
                }
                default
            }
        };

        log::debug!("reading config file {}", path.display());
        Self::read(&path).map_err(|source| Error::ConfigFile { path, source })
    }

    fn read(path: &Path) -> Result<Self, ConfigFileError> {
        let text = fs::read_to_string(path)?;
        Ok(toml::from_str(&text)?)
    }
}

/// Host runtime settings: the physical device pool and target geometry.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RuntimeConfig {
    /// Directory holding one lock file per attached device.
    pub lock_dir: PathBuf,
    pub tiles_per_ipu: usize,
    pub bytes_per_tile: usize,
    /// Physical devices in enumeration order.
    pub devices: Vec<DeviceEntry>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            lock_dir: std::env::temp_dir().join("ipurun-locks"),
            tiles_per_ipu: 1472,
            bytes_per_tile: 624 * 1024,
            devices: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DeviceEntry {
    pub id: u32,
    pub ipus: usize,
}
