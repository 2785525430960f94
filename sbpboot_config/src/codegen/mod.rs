//! Generation of the board specific sources included by the bootloader.

use std::{fs::OpenOptions, io::Write, path::Path};

use anyhow::Result;

use crate::Configuration;

pub mod linker_script;
pub mod partitions;

/// Name of the generated partition table, relative to the output directory.
pub const PARTITIONS_FILE: &str = "partitions.rs";
/// Name of the generated linker script, relative to the output directory.
pub const LINKER_SCRIPT_FILE: &str = "memory.x";

/// Writes every generated file for `configuration` into `out_dir`.
pub fn generate_modules<P: AsRef<Path>>(out_dir: P, configuration: &Configuration) -> Result<()> {
    let out_dir = out_dir.as_ref();
    write_file(&out_dir.join(LINKER_SCRIPT_FILE), &linker_script::render(configuration))?;
    write_file(&out_dir.join(PARTITIONS_FILE), &partitions::render(configuration))?;
    Ok(())
}

fn write_file(path: &Path, contents: &str) -> Result<()> {
    let mut file = OpenOptions::new().write(true).create(true).truncate(true).open(path)?;
    file.write_all(contents.as_bytes())?;
    Ok(())
}
