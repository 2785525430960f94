use anyhow::{Context, Result};
use clap::Parser;
use sbpboot_lib::devices::partition::{StagingSlot, PARTITION_MAP};
use std::{fs, path::PathBuf, time::Duration};

mod session;

use session::{parse_version, Pacing, Session};

#[derive(Parser)]
#[command(about = "Streams a firmware image to the sbpboot bootloader", version)]
struct Opts {
    /// Raw application binary to install.
    image: PathBuf,
    /// Image version, as up to four dot separated bytes (e.g. 1.2.3).
    version: String,
    /// Serial device the bootloader is attached to.
    #[arg(short, long, default_value = "/dev/ttyUSB0")]
    port: String,
    #[arg(short, long, default_value_t = 115_200)]
    baud: u32,
    /// Pause after START and CONF, while the bootloader erases.
    #[arg(long, default_value_t = 2000)]
    setup_delay_ms: u64,
    /// Pause after each DATA packet, while the bootloader programs it.
    #[arg(long, default_value_t = 200)]
    data_delay_ms: u64,
    /// How long to wait for each response, in seconds.
    #[arg(long, default_value_t = 30)]
    timeout_s: u64,
}

fn main() -> Result<()> {
    let opts = Opts::parse();
    let version = parse_version(&opts.version)?;
    let image = fs::read(&opts.image)
        .with_context(|| format!("failed to read {}", opts.image.display()))?;
    let max_size = PARTITION_MAP.app.size.min(PARTITION_MAP.staging(StagingSlot::One).size);

    println!("Opening {} at {} baud", opts.port, opts.baud);
    let port = serialport::new(&opts.port, opts.baud)
        .timeout(Duration::from_secs(opts.timeout_s))
        .open()
        .with_context(|| format!("failed to open {}", opts.port))?;

    let pacing = Pacing {
        after_setup: Duration::from_millis(opts.setup_delay_ms),
        after_data: Duration::from_millis(opts.data_delay_ms),
    };
    Session::new(port, pacing).flash(&image, version, max_size)?;
    println!("Done!");
    Ok(())
}
