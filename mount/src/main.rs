//! `imgfs-mount`: mounts a fixed-size image file as a FUSE filesystem.

mod bridge;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use fuser::MountOption;
use imgfs_core::Volume;
use log::error;

/// Mount a single-image user-space filesystem.
#[derive(Parser)]
#[command(author, version, about)]
struct Cli {
    /// Path to the disk image. Created and initialized if it does not exist.
    image: PathBuf,

    /// Directory to mount the filesystem at.
    mountpoint: PathBuf,

    /// Stay attached to the terminal instead of forking to the background.
    #[arg(short, long)]
    foreground: bool,

    /// Allow users other than the mounting user to access the filesystem.
    #[arg(long)]
    allow_other: bool,

    /// Increase log verbosity; repeat for more detail.
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let volume = match Volume::open(&cli.image) {
        Ok(v) => v,
        Err(e) => {
            error!("failed to open {}: {e}", cli.image.display());
            return ExitCode::FAILURE;
        }
    };

    let mut options = vec![
        MountOption::FSName("imgfs".to_string()),
        MountOption::DefaultPermissions,
    ];
    if cli.allow_other {
        options.push(MountOption::AllowOther);
    }
    if !cli.foreground {
        options.push(MountOption::AutoUnmount);
    }

    let bridge = bridge::Bridge::new(volume);
    if let Err(e) = fuser::mount2(bridge, &cli.mountpoint, &options) {
        error!("mount failed: {e}");
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}
