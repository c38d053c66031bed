//! FortiGate Client Library
//!
//! A typed client for the FortiOS REST API plus the two operator workflows
//! built on it:
//!
//! - **Fleet firmware upgrade**: for every firewall in an inventory file,
//!   query the firmware catalog, check that the requested version is
//!   offered, back up the configuration and upload the image.
//! - **SD-WAN provisioning**: create an "Internet SD-WAN" zone on the
//!   traffic VDOM, attach the WAN interface and set up the default route.
//!
//! # Example
//!
//! ```rust,no_run
//! use fgt_client::{ClientConfig, FleetRunner, Inventory, UpgradeOptions};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> fgt_client::Result<()> {
//!     let runner = FleetRunner::prepare(
//!         "FGT_60F-v7.4.1.F-build2463-FORTINET.out",
//!         ClientConfig::default(),
//!         UpgradeOptions::default(),
//!     )?;
//!     let inventory = Inventory::load("firewalls.csv")?;
//!
//!     let report = runner.run(&inventory, |device, event| {
//!         println!("{}: {:?}", device, event);
//!     }).await;
//!     println!("{} devices processed", report.processed());
//!     Ok(())
//! }
//! ```
//!
//! # TLS
//!
//! Certificates are verified by default. Appliances with self-signed
//! certificates need [`ClientConfig::insecure`] set explicitly.
//!
//! # Testing
//!
//! The `testing` module serves a mock appliance in-process:
//!
//! ```rust,ignore
//! use fgt_client::testing::{MockDevice, MockFortiGate};
//!
//! let mock = MockFortiGate::new().device("tok", MockDevice::new().offering(&["v7.4.1"]));
//! let server = mock.start().await?;
//! let catalog = server.client("tok")?.firmware().await?;
//! ```

mod client;
mod config;
mod error;
pub mod fleet;
pub mod inventory;
pub mod prompt;
pub mod provision;
pub mod testing;
mod types;
pub mod upgrade;
mod version;

pub use client::{ApiResponse, FgtClient};
pub use config::{ClientConfig, ClientConfigBuilder, TimeoutsConfig, API_PREFIX};
pub use error::{FgtError, RecordError, Result, StepFailure};
pub use types::*;
pub use version::{extract_version, find_candidate, is_valid_ipv4, parse_ipv4};

// Re-export workflow entry points for convenience
pub use fleet::{FleetReport, FleetRunner};
pub use inventory::Inventory;
pub use prompt::Prompter;
pub use provision::{ProvisionInput, ProvisionOptions, ProvisionReport, ProvisioningWorkflow};
pub use upgrade::{
    DeviceUpgrade, DeviceUpgradeWorkflow, FirmwareImage, UpgradeEvent, UpgradeOptions,
    UpgradeState,
};
