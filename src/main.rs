//! ipurun CLI
//!
//! Binds an IPU (or the IPU model) and prepares the job executable, reusing a
//! saved one when asked to.

use anyhow::Result;
use colored::Colorize;
use env_logger::Env;

use ipurun::config::FileConfig;
use ipurun::runtime::{Device, HostRuntime};
use ipurun::Options;

fn main() -> Result<()> {
    let options = Options::resolve(std::env::args_os())?;

    let filter = if options.verbose() { "debug" } else { "info" };
    env_logger::Builder::from_env(Env::default().default_filter_or(filter)).init();

    let config = FileConfig::load(options.config())?;
    let runtime = HostRuntime::new(config.runtime);

    let prepared = ipurun::prepare(&runtime, &options)?;
    let target = prepared.device.target();

    println!("{} {}", "Ready:".green().bold(), prepared.executable.program);
    println!(
        "  {} {} x{} (id {})",
        "Device:".cyan(),
        target.kind,
        target.num_ipus,
        prepared.device.id()
    );
    println!(
        "  {} {}",
        "Executable:".cyan(),
        if options.load_exe() {
            format!("loaded from {}", options.exe_file_name().display())
        } else if options.save_exe() {
            format!("compiled, saved to {}", options.exe_file_name().display())
        } else {
            "compiled".to_string()
        }
    );
    if options.profile() {
        println!(
            "  {} {}",
            "Profile:".cyan(),
            options.profile_name().display()
        );
    }

    Ok(())
}
