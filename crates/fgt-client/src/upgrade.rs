//! Per-device firmware upgrade workflow
//!
//! ```text
//! Querying → Matching ─┬→ NotFound
//!                      └→ BackingUp → Uploading → Done
//! (Querying | BackingUp | Uploading) → Failed
//! ```
//!
//! The backup is best-effort unless [`UpgradeOptions::require_backup`] is
//! set: a failed backup is reported and the upload still proceeds. `Done`
//! means the device accepted the image; the reboot and the resulting version
//! are not observed.

use std::fmt;
use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};

use base64::Engine;
use tracing::{info, instrument, warn};

use crate::client::FgtClient;
use crate::error::{FgtError, Result, StepFailure};
use crate::types::{DeviceRecord, FirmwareInventory, UpgradeRequest};
use crate::version::{extract_version, find_candidate};

/// Workflow states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UpgradeState {
    /// Fetching the firmware catalog
    Querying,
    /// Looking for the requested version in the catalog
    Matching,
    /// Saving the device configuration
    BackingUp,
    /// Sending the firmware image
    Uploading,
    /// Requested version not offered by this device
    NotFound,
    /// Image accepted by the device
    Done,
    /// A request failed
    Failed,
}

impl UpgradeState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::NotFound | Self::Done | Self::Failed)
    }
}

impl fmt::Display for UpgradeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Querying => write!(f, "Querying"),
            Self::Matching => write!(f, "Matching"),
            Self::BackingUp => write!(f, "BackingUp"),
            Self::Uploading => write!(f, "Uploading"),
            Self::NotFound => write!(f, "NotFound"),
            Self::Done => write!(f, "Done"),
            Self::Failed => write!(f, "Failed"),
        }
    }
}

/// Firmware image read once and shared by every device in the run
#[derive(Clone)]
pub struct FirmwareImage {
    /// Base name sent to the device
    pub filename: String,
    /// Size of the raw image in bytes
    pub size: usize,
    encoded: String,
}

impl FirmwareImage {
    /// Read and base64-encode an image file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let data = std::fs::read(path).map_err(|e| {
            FgtError::Io(std::io::Error::new(
                e.kind(),
                format!("{}: {}", path.display(), e),
            ))
        })?;
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Ok(Self::from_bytes(filename, &data))
    }

    pub fn from_bytes(filename: impl Into<String>, data: &[u8]) -> Self {
        Self {
            filename: filename.into(),
            size: data.len(),
            encoded: base64::engine::general_purpose::STANDARD.encode(data),
        }
    }

    /// Base64 content as sent in the upload body
    pub fn encoded(&self) -> &str {
        &self.encoded
    }
}

impl fmt::Debug for FirmwareImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FirmwareImage")
            .field("filename", &self.filename)
            .field("size", &self.size)
            .finish_non_exhaustive()
    }
}

impl UpgradeRequest {
    /// Derive the request from an image path
    ///
    /// Fails when the file name carries no `x.y.z` version.
    pub fn from_image_path(path: impl Into<PathBuf>) -> Result<Self> {
        let image_path = path.into();
        let filename = image_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let target_version = extract_version(&filename).ok_or_else(|| {
            FgtError::input(format!(
                "unable to extract firmware version from filename '{}'",
                filename
            ))
        })?;
        Ok(Self {
            target_version,
            image_path,
        })
    }
}

/// Options for the upgrade workflow
#[derive(Debug, Clone)]
pub struct UpgradeOptions {
    /// Directory receiving `{name}-{address}-config-backup.conf`
    pub backup_dir: PathBuf,
    /// Stop before uploading when the backup fails
    pub require_backup: bool,
}

impl Default for UpgradeOptions {
    fn default() -> Self {
        Self {
            backup_dir: PathBuf::from("."),
            require_backup: false,
        }
    }
}

/// Name of the configuration backup file for a device
pub fn backup_file_name(device: &DeviceRecord) -> String {
    format!("{}-{}-config-backup.conf", device.name, device.address)
}

/// Result of the backup step
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum BackupOutcome {
    #[default]
    NotAttempted,
    Saved(PathBuf),
    Failed(StepFailure),
}

/// Progress notifications emitted while a device is processed
#[derive(Debug)]
pub enum UpgradeEvent<'a> {
    /// Entered a new state
    State(UpgradeState),
    /// Firmware catalog received
    Catalog(&'a FirmwareInventory),
    BackupSaved(&'a Path),
    /// Backup failed; `proceeding` is true when the upload goes ahead anyway
    BackupFailed {
        error: &'a FgtError,
        proceeding: bool,
    },
    /// Image accepted, with the file identifier the device returned
    Uploaded(Option<&'a str>),
}

/// Final record of one device's workflow
#[derive(Debug, Clone)]
pub struct DeviceUpgrade {
    pub device: String,
    pub address: Ipv4Addr,
    /// Terminal state
    pub state: UpgradeState,
    /// Every state entered, in order
    pub history: Vec<UpgradeState>,
    pub current_version: Option<String>,
    pub backup: BackupOutcome,
    pub file_id: Option<String>,
    /// Set when `state` is `Failed`
    pub failure: Option<(UpgradeState, StepFailure)>,
}

impl DeviceUpgrade {
    fn start(device: &DeviceRecord) -> Self {
        Self {
            device: device.name.clone(),
            address: device.address,
            state: UpgradeState::Querying,
            history: Vec::new(),
            current_version: None,
            backup: BackupOutcome::NotAttempted,
            file_id: None,
            failure: None,
        }
    }

    /// A device that failed before its workflow could start
    pub fn failed_before_start(device: &DeviceRecord, error: &FgtError) -> Self {
        let mut upgrade = Self::start(device);
        upgrade.history = vec![UpgradeState::Querying, UpgradeState::Failed];
        upgrade.state = UpgradeState::Failed;
        upgrade.failure = Some((UpgradeState::Querying, error.into()));
        upgrade
    }

    pub fn is_success(&self) -> bool {
        self.state == UpgradeState::Done
    }
}

/// Upgrade workflow for a single device
pub struct DeviceUpgradeWorkflow<'a> {
    device: &'a DeviceRecord,
    request: &'a UpgradeRequest,
    image: &'a FirmwareImage,
    options: &'a UpgradeOptions,
}

impl<'a> DeviceUpgradeWorkflow<'a> {
    pub fn new(
        device: &'a DeviceRecord,
        request: &'a UpgradeRequest,
        image: &'a FirmwareImage,
        options: &'a UpgradeOptions,
    ) -> Self {
        Self {
            device,
            request,
            image,
            options,
        }
    }

    /// Run the workflow to a terminal state
    ///
    /// Never returns an error: every failure ends in [`UpgradeState::Failed`]
    /// with the cause recorded on the returned [`DeviceUpgrade`].
    #[instrument(skip_all, fields(device = %self.device.name, address = %self.device.address))]
    pub async fn run<F>(&self, client: &FgtClient, mut on_event: F) -> DeviceUpgrade
    where
        F: FnMut(&UpgradeEvent<'_>),
    {
        let mut report = DeviceUpgrade::start(self.device);
        let enter = |report: &mut DeviceUpgrade, state: UpgradeState, on_event: &mut F| {
            report.state = state;
            report.history.push(state);
            on_event(&UpgradeEvent::State(state));
        };

        enter(&mut report, UpgradeState::Querying, &mut on_event);
        let catalog = match client.firmware().await {
            Ok(catalog) => catalog,
            Err(e) => {
                warn!("Unable to retrieve firmware versions: {}", e);
                report.failure = Some((UpgradeState::Querying, (&e).into()));
                enter(&mut report, UpgradeState::Failed, &mut on_event);
                return report;
            }
        };
        report.current_version = catalog.current.clone();
        on_event(&UpgradeEvent::Catalog(&catalog));

        enter(&mut report, UpgradeState::Matching, &mut on_event);
        if find_candidate(&catalog.available, &self.request.target_version).is_none() {
            info!(
                "Firmware version {} not offered by device",
                self.request.target_version
            );
            enter(&mut report, UpgradeState::NotFound, &mut on_event);
            return report;
        }

        enter(&mut report, UpgradeState::BackingUp, &mut on_event);
        match self.save_backup(client).await {
            Ok(path) => {
                on_event(&UpgradeEvent::BackupSaved(&path));
                report.backup = BackupOutcome::Saved(path);
            }
            Err(e) => {
                let proceeding = !self.options.require_backup;
                warn!(proceeding, "Configuration backup failed: {}", e);
                on_event(&UpgradeEvent::BackupFailed {
                    error: &e,
                    proceeding,
                });
                report.backup = BackupOutcome::Failed((&e).into());
                if !proceeding {
                    report.failure = Some((UpgradeState::BackingUp, (&e).into()));
                    enter(&mut report, UpgradeState::Failed, &mut on_event);
                    return report;
                }
            }
        }

        enter(&mut report, UpgradeState::Uploading, &mut on_event);
        info!(
            "Uploading {} ({} bytes)",
            self.image.filename, self.image.size
        );
        match client
            .upload_firmware(&self.image.filename, self.image.encoded())
            .await
        {
            Ok(file_id) => {
                on_event(&UpgradeEvent::Uploaded(file_id.as_deref()));
                report.file_id = file_id;
                enter(&mut report, UpgradeState::Done, &mut on_event);
            }
            Err(e) => {
                warn!("Firmware upload failed: {}", e);
                report.failure = Some((UpgradeState::Uploading, (&e).into()));
                enter(&mut report, UpgradeState::Failed, &mut on_event);
            }
        }

        report
    }

    async fn save_backup(&self, client: &FgtClient) -> Result<PathBuf> {
        let config = client.backup_config().await?;
        let path = self.options.backup_dir.join(backup_file_name(self.device));
        tokio::fs::write(&path, config).await?;
        info!("Configuration saved to {}", path.display());
        Ok(path)
    }
}
