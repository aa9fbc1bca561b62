//! Subcommand implementations

use anyhow::{bail, Context, Result};
use partlib_core::{Device, Uuid, Violation};
use serde::Serialize;
use std::path::Path;
use tracing::{debug, info, warn};

use crate::config::Config;

/// JSON view of a device for `show --json`
#[derive(Debug, Serialize)]
struct DeviceSummary {
    uuid: Uuid,
    version: String,
    author: String,
    name: Option<String>,
    deprecated: bool,
    component: Option<Uuid>,
    package: Option<Uuid>,
    pad_signal_map: Vec<PadSignal>,
    violations: Vec<Violation>,
}

#[derive(Debug, Serialize)]
struct PadSignal {
    pad: Uuid,
    signal: Uuid,
}

impl DeviceSummary {
    fn new(device: &Device) -> Self {
        let core = device.core();
        Self {
            uuid: core.uuid(),
            version: core.version().to_string(),
            author: core.author().to_string(),
            name: core.names().default_value().map(str::to_string),
            deprecated: core.is_deprecated(),
            component: device.component(),
            package: device.package(),
            pad_signal_map: device
                .pad_signal_map()
                .iter()
                .map(|(pad, signal)| PadSignal { pad, signal })
                .collect(),
            violations: device.validate(),
        }
    }
}

pub struct NewDevice<'a> {
    pub name: &'a str,
    pub author: Option<&'a str>,
    pub description: &'a str,
    pub component: Uuid,
    pub package: Uuid,
}

/// Create and save a fresh device, returning its UUID
pub fn new_device(dir: &Path, args: NewDevice<'_>, config: &Config) -> Result<Uuid> {
    if dir.join(Device::KIND.file_name()).exists() {
        bail!("{} already contains a device", dir.display());
    }

    let uuid = Uuid::new_v4();
    let mut device = Device::new(
        uuid,
        config.library.version.clone(),
        args.author.unwrap_or(&config.library.author),
        args.name,
        args.description,
        "",
    );
    device.set_component(args.component);
    device.set_package(args.package);
    device
        .save_to(dir)
        .with_context(|| format!("saving device to {}", dir.display()))?;

    info!(%uuid, dir = %dir.display(), "Created device");
    Ok(uuid)
}

pub fn show(dir: &Path, json: bool) -> Result<()> {
    let device = open(dir, true)?;
    let summary = DeviceSummary::new(&device);

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    println!("Device {}", summary.uuid);
    println!(
        "  Name:       {}",
        summary.name.as_deref().unwrap_or("(none)")
    );
    println!("  Version:    {}", summary.version);
    println!("  Author:     {}", summary.author);
    if summary.deprecated {
        println!("  Deprecated: yes");
    }
    println!("  Component:  {}", display_ref(summary.component));
    println!("  Package:    {}", display_ref(summary.package));
    println!("  Pads ({}):", summary.pad_signal_map.len());
    for entry in &summary.pad_signal_map {
        println!("    {} -> {}", entry.pad, entry.signal);
    }
    for violation in &summary.violations {
        println!("  ! {}", violation);
    }
    Ok(())
}

fn display_ref(value: Option<Uuid>) -> String {
    value.map_or_else(|| "(not set)".to_string(), |u| u.to_string())
}

/// Load and validate each directory; returns whether all of them passed
pub fn check(dirs: &[impl AsRef<Path>]) -> bool {
    let mut all_ok = true;
    for dir in dirs {
        let dir = dir.as_ref();
        match Device::open(dir, true) {
            Ok(device) => {
                let violations = device.validate();
                if violations.is_empty() {
                    println!("ok      {}", dir.display());
                } else {
                    all_ok = false;
                    println!("invalid {}", dir.display());
                    for violation in violations {
                        println!("        {}", violation);
                    }
                }
            }
            Err(e) => {
                all_ok = false;
                warn!(dir = %dir.display(), error = %e, "Failed to load device");
                println!("error   {}: {}", dir.display(), e);
            }
        }
    }
    all_ok
}

/// Rewrite each device file in canonical form without touching its metadata
pub fn fmt(dirs: &[impl AsRef<Path>]) -> Result<()> {
    for dir in dirs {
        let dir = dir.as_ref();
        let device = open(dir, false)?;
        let canonical = device.to_xml()?;
        let path = device.core().file_path();
        let current = std::fs::read_to_string(&path)?;
        if current == canonical {
            debug!(path = %path.display(), "Already canonical");
            println!("unchanged {}", dir.display());
        } else {
            std::fs::write(&path, canonical)?;
            println!("formatted {}", dir.display());
        }
    }
    Ok(())
}

pub fn map_add(dir: &Path, pad: Uuid, signal: Uuid) -> Result<()> {
    let mut device = open(dir, false)?;
    if let Some(existing) = device.pad_signal_map().signal_of(&pad) {
        bail!("pad {} is already mapped to signal {}", pad, existing);
    }
    device.add_pad_signal_mapping(pad, signal);
    device.save()?;
    info!(%pad, %signal, "Added pad mapping");
    Ok(())
}

pub fn map_remove(dir: &Path, pad: Uuid) -> Result<()> {
    let mut device = open(dir, false)?;
    if !device.pad_signal_map().contains_pad(&pad) {
        bail!("pad {} is not mapped in {}", pad, dir.display());
    }
    device.remove_pad_signal_mapping(pad);
    device.save()?;
    info!(%pad, "Removed pad mapping");
    Ok(())
}

fn open(dir: &Path, read_only: bool) -> Result<Device> {
    Device::open(dir, read_only).with_context(|| format!("loading device from {}", dir.display()))
}
