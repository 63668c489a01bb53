//! Input device discovery

use std::path::PathBuf;

use anyhow::Result;
use evdev::Device;

/// What a device can contribute to the log
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    pub keyboard: bool,
    pub pointer: bool,
}

impl Capabilities {
    pub fn of(device: &Device) -> Self {
        Self {
            keyboard: is_keyboard(device),
            pointer: is_pointer(device),
        }
    }

    pub fn is_relevant(&self) -> bool {
        self.keyboard || self.pointer
    }
}

/// Information about an input device
#[derive(Debug)]
pub struct DeviceInfo {
    pub path: PathBuf,
    pub name: String,
    pub capabilities: Capabilities,
}

/// Enumerate keyboards and pointers under /dev/input
pub fn enumerate_devices() -> Result<Vec<DeviceInfo>> {
    let mut devices = Vec::new();

    for entry in std::fs::read_dir("/dev/input")? {
        let entry = entry?;
        let path = entry.path();

        if !path
            .file_name()
            .and_then(|n| n.to_str())
            .map(|n| n.starts_with("event"))
            .unwrap_or(false)
        {
            continue;
        }

        match Device::open(&path) {
            Ok(device) => {
                let capabilities = Capabilities::of(&device);
                if !capabilities.is_relevant() {
                    continue;
                }
                devices.push(DeviceInfo {
                    name: device.name().unwrap_or("Unknown").to_string(),
                    path,
                    capabilities,
                });
            }
            Err(e) => {
                tracing::debug!("Could not open {}: {}", path.display(), e);
            }
        }
    }

    devices.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(devices)
}

/// Check if a device is a keyboard. `keyguide devices` mirrors this check
/// and [`is_pointer`].
pub fn is_keyboard(device: &Device) -> bool {
    device
        .supported_keys()
        .map(|keys| keys.contains(evdev::Key::KEY_A))
        .unwrap_or(false)
}

/// Check if a device is a mouse-like pointer
pub fn is_pointer(device: &Device) -> bool {
    let has_left = device
        .supported_keys()
        .map(|keys| keys.contains(evdev::Key::BTN_LEFT))
        .unwrap_or(false);
    let has_motion = device
        .supported_relative_axes()
        .map(|axes| axes.contains(evdev::RelativeAxisType::REL_X))
        .unwrap_or(false);
    has_left && has_motion
}
