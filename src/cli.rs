//! Command line surface.

use std::path::PathBuf;

use clap::builder::RangedU64ValueParser;
use clap::Parser;

#[derive(Debug, Parser)]
#[command(name = "ipurun")]
#[command(about = "Acquire an IPU and compile or load the job executable", long_about = None)]
pub struct Cli {
    /// Select hardware to use
    #[arg(long = "device", default_value_t = 1, allow_negative_numbers = true)]
    pub devices: i32,

    /// Select consumption task to use
    #[arg(long = "con_task", default_value_t = 1, allow_negative_numbers = true)]
    pub con_task: i32,

    /// Select source
    #[arg(long, default_value_t = 1, allow_negative_numbers = true)]
    pub source: i32,

    /// Select matrix dimensions
    #[arg(long = "dimension", default_value_t = 5, allow_negative_numbers = true)]
    pub dimensions: i32,

    /// If set then use IPU model instead of hardware
    #[arg(long)]
    pub model: bool,

    /// Number of IPUs to use
    #[arg(long, default_value_t = 1, value_parser = RangedU64ValueParser::<usize>::new().range(1..))]
    pub ipus: usize,

    /// Save the graph executable under a file name with this prefix.
    /// This option is required when loading/saving executables
    #[arg(long, default_value = "")]
    pub exe_name: String,

    /// Save the graph executable after compilation. You must also set 'exe-name'
    #[arg(long)]
    pub save_exe: bool,

    /// Load a previously saved executable and skip graph and program
    /// construction. You must also set 'exe-name'
    #[arg(long)]
    pub load_exe: bool,

    /// Enable profile output
    #[arg(long)]
    pub profile: bool,

    /// Name of profile output file
    #[arg(long, default_value = "profile.txt")]
    pub profile_name: PathBuf,

    /// Runtime configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,
}
