//! Sequential firmware upgrade across an inventory

use std::path::Path;

use tracing::{info, warn};

use crate::client::FgtClient;
use crate::config::ClientConfig;
use crate::error::{RecordError, Result};
use crate::inventory::Inventory;
use crate::types::{DeviceRecord, UpgradeRequest};
use crate::upgrade::{
    DeviceUpgrade, DeviceUpgradeWorkflow, FirmwareImage, UpgradeEvent, UpgradeOptions,
    UpgradeState,
};

/// Runs [`DeviceUpgradeWorkflow`] for every device of an inventory, one at a
/// time and in file order
#[derive(Debug, Clone)]
pub struct FleetRunner {
    config: ClientConfig,
    request: UpgradeRequest,
    image: FirmwareImage,
    options: UpgradeOptions,
}

impl FleetRunner {
    pub fn new(
        config: ClientConfig,
        request: UpgradeRequest,
        image: FirmwareImage,
        options: UpgradeOptions,
    ) -> Self {
        Self {
            config,
            request,
            image,
            options,
        }
    }

    /// Derive the target version from the image name and load the image
    pub fn prepare(
        image_path: impl AsRef<Path>,
        config: ClientConfig,
        options: UpgradeOptions,
    ) -> Result<Self> {
        let request = UpgradeRequest::from_image_path(image_path.as_ref())?;
        let image = FirmwareImage::load(&request.image_path)?;
        Ok(Self::new(config, request, image, options))
    }

    pub fn request(&self) -> &UpgradeRequest {
        &self.request
    }

    pub fn image(&self) -> &FirmwareImage {
        &self.image
    }

    /// Process every inventory entry
    ///
    /// Malformed rows are skipped and recorded; a device failure never stops
    /// the loop.
    pub async fn run<F>(&self, inventory: &Inventory, mut on_event: F) -> FleetReport
    where
        F: FnMut(&DeviceRecord, &UpgradeEvent<'_>),
    {
        let mut report = FleetReport::default();

        for entry in &inventory.entries {
            let device = match entry {
                Ok(device) => device,
                Err(e) => {
                    warn!("Skipping inventory row: {}", e);
                    report.skipped.push(e.clone());
                    continue;
                }
            };

            info!(device = %device.name, address = %device.address, "Connecting");
            let upgrade = match FgtClient::new(device.address, device.token(), &self.config) {
                Ok(client) => {
                    DeviceUpgradeWorkflow::new(device, &self.request, &self.image, &self.options)
                        .run(&client, |event| on_event(device, event))
                        .await
                }
                Err(e) => {
                    warn!(device = %device.name, "Unable to create client: {}", e);
                    on_event(device, &UpgradeEvent::State(UpgradeState::Failed));
                    DeviceUpgrade::failed_before_start(device, &e)
                }
            };
            report.devices.push(upgrade);
        }

        info!(
            processed = report.processed(),
            skipped = report.skipped.len(),
            "Fleet run finished"
        );
        report
    }
}

/// Outcome of a fleet run
#[derive(Debug, Clone, Default)]
pub struct FleetReport {
    /// Processed devices in inventory order
    pub devices: Vec<DeviceUpgrade>,
    /// Inventory rows that were skipped
    pub skipped: Vec<RecordError>,
}

impl FleetReport {
    /// Number of devices whose workflow ran
    pub fn processed(&self) -> usize {
        self.devices.len()
    }

    pub fn count(&self, state: UpgradeState) -> usize {
        self.devices.iter().filter(|d| d.state == state).count()
    }

    /// True when every row was a device and every device reached `Done`
    pub fn is_clean(&self) -> bool {
        self.skipped.is_empty() && self.devices.iter().all(DeviceUpgrade::is_success)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    fn upgrade(name: &str, state: UpgradeState) -> DeviceUpgrade {
        let device = DeviceRecord::new(name, Ipv4Addr::LOCALHOST, "t");
        let mut upgrade =
            DeviceUpgrade::failed_before_start(&device, &crate::FgtError::input("x"));
        upgrade.state = state;
        upgrade
    }

    #[test]
    fn test_report_counts() {
        let report = FleetReport {
            devices: vec![
                upgrade("a", UpgradeState::Done),
                upgrade("b", UpgradeState::NotFound),
                upgrade("c", UpgradeState::Done),
            ],
            skipped: vec![],
        };
        assert_eq!(report.processed(), 3);
        assert_eq!(report.count(UpgradeState::Done), 2);
        assert!(!report.is_clean());
    }

    #[test]
    fn test_skipped_rows_make_report_unclean() {
        let report = FleetReport {
            devices: vec![upgrade("a", UpgradeState::Done)],
            skipped: vec![RecordError {
                line: 2,
                name: None,
                reason: "missing fgt_name".into(),
            }],
        };
        assert!(!report.is_clean());
        assert!(FleetReport::default().is_clean());
    }
}
