//! Device module.
//!
//! Where firewalls come from (inventory) and how their saved
//! configuration documents are retrieved (fetchers).

mod cache;
mod fetch;

pub use cache::{CachedFetcher, DEFAULT_CACHE_SIZE, DEFAULT_CACHE_TTL};
pub use fetch::{DirectoryFetcher, HttpFetcher};

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Result, TrackerError};

/// A managed firewall
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Device {
    pub name: String,
    /// Address the configuration is retrieved from
    #[serde(alias = "address")]
    pub management_address: String,
}

impl Device {
    /// Create a device. A prefix length on the address (`10.0.0.1/24`, as
    /// inventories often store interface addresses) is dropped.
    pub fn new(name: impl Into<String>, management_address: impl AsRef<str>) -> Self {
        Self {
            name: name.into(),
            management_address: strip_prefix_len(management_address.as_ref()).to_string(),
        }
    }
}

fn strip_prefix_len(address: &str) -> &str {
    address
        .split_once('/')
        .map_or(address, |(host, _)| host)
        .trim()
}

/// Source of the device list
pub trait InventoryProvider: Send + Sync {
    fn devices(&self) -> Result<Vec<Device>>;
}

/// Source of raw configuration documents
pub trait ConfigFetcher: Send + Sync {
    /// Retrieve the configuration document of `device` as text.
    fn fetch(&self, device: &Device) -> Result<String>;
}

impl<F: ConfigFetcher + ?Sized> ConfigFetcher for Box<F> {
    fn fetch(&self, device: &Device) -> Result<String> {
        (**self).fetch(device)
    }
}

/// Fixed, in-memory device list
#[derive(Debug, Clone, Default)]
pub struct StaticInventory {
    devices: Vec<Device>,
}

impl StaticInventory {
    pub fn new(devices: Vec<Device>) -> Self {
        Self { devices }
    }
}

impl FromIterator<Device> for StaticInventory {
    fn from_iter<I: IntoIterator<Item = Device>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

impl InventoryProvider for StaticInventory {
    fn devices(&self) -> Result<Vec<Device>> {
        Ok(self.devices.clone())
    }
}

/// Device list kept in a JSON file: `[{"name": ..., "management_address": ...}]`.
///
/// The file is re-read on every call.
#[derive(Debug, Clone)]
pub struct JsonInventory {
    path: PathBuf,
}

impl JsonInventory {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Parse inventory JSON text.
    pub fn parse(text: &str) -> Result<Vec<Device>> {
        let devices: Vec<Device> = serde_json::from_str(text)?;
        devices
            .into_iter()
            .map(|device| {
                if device.name.trim().is_empty() {
                    return Err(TrackerError::InventoryError(format!(
                        "device with address '{}' has no name",
                        device.management_address
                    )));
                }
                if device.management_address.trim().is_empty() {
                    return Err(TrackerError::InvalidAddress(format!(
                        "device '{}' has no management address",
                        device.name
                    )));
                }
                Ok(Device::new(device.name, &device.management_address))
            })
            .collect()
    }
}

impl InventoryProvider for JsonInventory {
    fn devices(&self) -> Result<Vec<Device>> {
        let text = fs::read_to_string(&self.path).map_err(|e| {
            TrackerError::InventoryError(format!("{}: {}", self.path.display(), e))
        })?;
        let devices = Self::parse(&text)?;
        debug!(path = %self.path.display(), devices = devices.len(), "inventory loaded");
        Ok(devices)
    }
}
