use anyhow::{anyhow, Result};
use sbpboot_config::{codegen::generate_modules, Configuration};
use std::{
    env,
    fs::File,
    io::{BufReader, Read},
    path::PathBuf,
};

const DEFAULT_CONFIG_FILENAME: &str = "config/stm32f429_discovery.ron";

fn main() -> Result<()> {
    println!("cargo:rerun-if-env-changed=SBPBOOT_CONFIG");
    println!("cargo:rerun-if-changed={}", DEFAULT_CONFIG_FILENAME);
    println!("cargo:rerun-if-changed=build.rs");

    let filename = env::var("SBPBOOT_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_FILENAME.into());
    let file = File::open(&filename)?;
    let mut buf_reader = BufReader::new(file);
    let mut contents = String::new();
    buf_reader.read_to_string(&mut contents)?;
    let configuration: Configuration = ron::from_str(&contents)?;

    validate_feature_flags_against_configuration(&configuration)?;
    configuration.validate()?;
    for name in configuration.memory_configuration.partitions_out_of_bounds() {
        println!("cargo:warning=Partition {} lies outside the configured flash bank", name);
    }

    let out_dir = PathBuf::from(env::var("OUT_DIR")?);
    generate_modules(&out_dir, &configuration)?;
    println!("cargo:rustc-link-search={}", out_dir.display());
    Ok(())
}

/// Board features are only checked when one is enabled; host test builds
/// don't select a port.
fn validate_feature_flags_against_configuration(configuration: &Configuration) -> Result<()> {
    let port_selected = env::var("CARGO_FEATURE_CORTEX_M_ANY").is_ok();
    if !port_selected {
        return Ok(());
    }

    for flag in configuration.required_feature_flags() {
        let variable = format!("CARGO_FEATURE_{}", flag.to_uppercase());
        if env::var(&variable).is_err() {
            return Err(anyhow!(
                "Mismatching port in configuration file. Configuration requires feature `{}` ({})",
                flag,
                configuration.port
            ));
        }
    }
    Ok(())
}
