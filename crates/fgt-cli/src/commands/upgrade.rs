//! Upgrade command - firmware upload across the inventory

use anyhow::{Context, Result};
use fgt_client::prompt::ask_non_empty;
use fgt_client::{
    ClientConfig, DeviceRecord, FleetRunner, Inventory, Prompter, UpgradeEvent, UpgradeOptions,
    UpgradeState,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use super::EXIT_PARTIAL_FAILURE;
use crate::config::MergedConfig;
use crate::output::{DeviceRow, OutputContext};

/// Arguments of `fgt-cli upgrade`
#[derive(Debug, clap::Args)]
pub struct UpgradeArgs {
    /// Firmware image file; the target version is taken from its name
    #[arg(long)]
    pub image: Option<PathBuf>,

    /// Inventory CSV with fgt_name, fw_ip and api_token columns
    #[arg(long)]
    pub inventory: Option<PathBuf>,

    /// Directory for configuration backups
    #[arg(long)]
    pub backup_dir: Option<PathBuf>,

    /// Do not upload to a device whose configuration backup failed
    #[arg(long)]
    pub require_backup: bool,
}

/// Upgrade every firewall listed in the inventory
pub async fn upgrade(
    args: UpgradeArgs,
    merged: &MergedConfig,
    client_config: &ClientConfig,
    ctx: &OutputContext,
    prompter: &mut dyn Prompter,
) -> Result<ExitCode> {
    ctx.info("FortiGate firewall firmware upgrade\n");

    let image_path = match args.image {
        Some(path) => path,
        None => PathBuf::from(
            ask_non_empty(
                prompter,
                "Enter the filename of the firmware image to upgrade to: ",
            )
            .context("No firmware image given")?,
        ),
    };

    let options = UpgradeOptions {
        backup_dir: args.backup_dir.unwrap_or_else(|| merged.backup_dir.clone()),
        require_backup: args.require_backup || merged.require_backup,
    };
    if options.require_backup {
        ctx.info("Uploads require a successful configuration backup");
    }

    let runner = FleetRunner::prepare(&image_path, client_config.clone(), options)
        .with_context(|| format!("Failed to prepare firmware image {}", image_path.display()))?;
    let target = runner.request().target_version.clone();
    ctx.info(&format!(
        "Target version {} ({}, {} bytes)",
        target,
        runner.image().filename,
        runner.image().size
    ));

    let inventory_path = args.inventory.unwrap_or_else(|| merged.inventory.clone());
    let inventory = Inventory::load(&inventory_path)
        .with_context(|| format!("Failed to load inventory {}", inventory_path.display()))?;
    if inventory.is_empty() {
        ctx.warn(&format!("No firewalls listed in {}", inventory_path.display()));
    }

    let mut renderer = EventRenderer::new(ctx, &target, &runner.image().filename);
    let report = runner
        .run(&inventory, |device, event| renderer.render(device, event))
        .await;
    renderer.finish();

    for skipped in &report.skipped {
        ctx.warn(&format!("Skipped {}", skipped));
    }

    let mut rows: Vec<DeviceRow> = report
        .devices
        .iter()
        .map(|d| DeviceRow::from_upgrade(d, &target))
        .collect();
    rows.extend(report.skipped.iter().map(DeviceRow::from_skipped));

    ctx.info("");
    ctx.print(&rows)?;
    ctx.info(&format!(
        "{} processed: {} uploaded, {} not offered, {} failed, {} skipped",
        report.processed(),
        report.count(UpgradeState::Done),
        report.count(UpgradeState::NotFound),
        report.count(UpgradeState::Failed),
        report.skipped.len()
    ));

    if report.is_clean() {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::from(EXIT_PARTIAL_FAILURE))
    }
}

/// Turns workflow events into console lines plus an upload spinner
struct EventRenderer<'a> {
    ctx: &'a OutputContext,
    target: &'a str,
    filename: &'a str,
    spinner: Option<ProgressBar>,
}

impl<'a> EventRenderer<'a> {
    fn new(ctx: &'a OutputContext, target: &'a str, filename: &'a str) -> Self {
        Self {
            ctx,
            target,
            filename,
            spinner: None,
        }
    }

    fn render(&mut self, device: &DeviceRecord, event: &UpgradeEvent<'_>) {
        let ctx = self.ctx;
        match event {
            UpgradeEvent::State(UpgradeState::Querying) => {
                ctx.info(&format!("\nConnecting to {}...", device));
            }
            UpgradeEvent::Catalog(catalog) => ctx.print_catalog(catalog),
            UpgradeEvent::State(UpgradeState::NotFound) => {
                ctx.error(&format!(
                    "Error: Firmware version {} not found for {}.",
                    self.target, device.name
                ));
            }
            UpgradeEvent::BackupSaved(path) => {
                ctx.success(&format!("Configuration file saved to {}", path.display()));
            }
            UpgradeEvent::BackupFailed { error, proceeding } => {
                let next = if *proceeding {
                    "continuing with upload"
                } else {
                    "upload cancelled"
                };
                ctx.warn(&format!(
                    "Configuration backup failed for {}: {} ({})",
                    device.name, error, next
                ));
            }
            UpgradeEvent::State(UpgradeState::Uploading) => {
                ctx.info(&format!(
                    "Firmware upgrade started for {}. Filename: {}",
                    device.name, self.filename
                ));
                self.start_spinner(&device.name);
            }
            UpgradeEvent::Uploaded(file_id) => {
                self.finish();
                let id = file_id.map(|id| format!(" (file id {})", id));
                ctx.success(&format!(
                    "Firmware image accepted by {}{}",
                    device.name,
                    id.unwrap_or_default()
                ));
            }
            UpgradeEvent::State(UpgradeState::Failed) => {
                self.finish();
                ctx.error(&format!("Upgrade failed for {}", device.name));
            }
            UpgradeEvent::State(_) => {}
        }
    }

    fn start_spinner(&mut self, name: &str) {
        if self.ctx.quiet || self.ctx.is_structured() {
            return;
        }
        let spinner = ProgressBar::new_spinner();
        if let Ok(style) =
            ProgressStyle::default_spinner().template("{spinner:.green} {msg} [{elapsed}]")
        {
            spinner.set_style(style);
        }
        spinner.set_message(format!("Uploading to {}...", name));
        spinner.enable_steady_tick(Duration::from_millis(100));
        self.spinner = Some(spinner);
    }

    fn finish(&mut self) {
        if let Some(spinner) = self.spinner.take() {
            spinner.finish_and_clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::{exit_code, EXIT_INVALID_INPUT};
    use crate::config::Config;
    use crate::output::OutputFormat;
    use fgt_client::testing::{MockDevice, MockFortiGate, ScriptedPrompter, TestServer};
    use std::path::Path;

    const IMAGE_NAME: &str = "FGT_60F-v7.4.1.F-build2463-FORTINET.out";

    fn quiet() -> OutputContext {
        OutputContext::new(OutputFormat::Table, true, true)
    }

    fn merged() -> MergedConfig {
        Config::default()
            .merge_with_args(false, None, None, true)
            .unwrap()
    }

    /// Write an image and an inventory of `(name, token)` rows pointing at localhost
    fn fixture(dir: &Path, image: &str, rows: &[(&str, &str)]) -> UpgradeArgs {
        let image_path = dir.join(image);
        std::fs::write(&image_path, b"\x7fFORTIOS").unwrap();

        let mut csv = String::from("fgt_name,fw_ip,api_token\n");
        for (name, token) in rows {
            csv.push_str(&format!("{},127.0.0.1,{}\n", name, token));
        }
        let inventory = dir.join("firewalls.csv");
        std::fs::write(&inventory, csv).unwrap();

        UpgradeArgs {
            image: Some(image_path),
            inventory: Some(inventory),
            backup_dir: Some(dir.to_path_buf()),
            require_backup: false,
        }
    }

    async fn run_upgrade(
        server: &TestServer,
        args: UpgradeArgs,
        prompter: &mut ScriptedPrompter,
    ) -> ExitCode {
        exit_code(upgrade(args, &merged(), &server.client_config(), &quiet(), prompter).await)
    }

    #[tokio::test]
    async fn test_clean_run_exits_zero() {
        let mock = MockFortiGate::new().device("tok", MockDevice::new().offering(&["v7.4.1"]));
        let server = mock.start().await.unwrap();
        let dir = tempfile::tempdir().unwrap();

        let args = fixture(dir.path(), IMAGE_NAME, &[("fw-1", "tok")]);
        let code = run_upgrade(&server, args, &mut ScriptedPrompter::default()).await;
        assert_eq!(code, ExitCode::SUCCESS);
    }

    #[tokio::test]
    async fn test_image_name_prompted_when_missing() {
        let mock = MockFortiGate::new().device("tok", MockDevice::new().offering(&["v7.4.1"]));
        let server = mock.start().await.unwrap();
        let dir = tempfile::tempdir().unwrap();

        let mut args = fixture(dir.path(), IMAGE_NAME, &[("fw-1", "tok")]);
        let image = args.image.take().unwrap();
        let mut prompter = ScriptedPrompter::new([image.display().to_string()]);

        let code = run_upgrade(&server, args, &mut prompter).await;
        assert_eq!(code, ExitCode::SUCCESS);
        assert_eq!(prompter.asked().len(), 1);
    }

    #[tokio::test]
    async fn test_versionless_image_exits_one() {
        let mock = MockFortiGate::new().device("tok", MockDevice::new().offering(&["v7.4.1"]));
        let server = mock.start().await.unwrap();
        let dir = tempfile::tempdir().unwrap();

        let args = fixture(dir.path(), "firmware_image.out", &[("fw-1", "tok")]);
        let code = run_upgrade(&server, args, &mut ScriptedPrompter::default()).await;
        assert_eq!(code, ExitCode::from(EXIT_INVALID_INPUT));
        assert!(mock.calls().is_empty());
    }

    #[tokio::test]
    async fn test_missing_inventory_exits_one() {
        let mock = MockFortiGate::new();
        let server = mock.start().await.unwrap();
        let dir = tempfile::tempdir().unwrap();

        let mut args = fixture(dir.path(), IMAGE_NAME, &[]);
        args.inventory = Some(dir.path().join("absent.csv"));
        let code = run_upgrade(&server, args, &mut ScriptedPrompter::default()).await;
        assert_eq!(code, ExitCode::from(EXIT_INVALID_INPUT));
    }

    #[tokio::test]
    async fn test_skipped_row_exits_two() {
        let mock = MockFortiGate::new().device("tok", MockDevice::new().offering(&["v7.4.1"]));
        let server = mock.start().await.unwrap();
        let dir = tempfile::tempdir().unwrap();

        let args = fixture(dir.path(), IMAGE_NAME, &[("fw-1", "tok"), ("fw-2", "")]);
        let code = run_upgrade(&server, args, &mut ScriptedPrompter::default()).await;
        assert_eq!(code, ExitCode::from(EXIT_PARTIAL_FAILURE));
    }

    #[tokio::test]
    async fn test_version_not_offered_exits_two() {
        let mock = MockFortiGate::new().device("tok", MockDevice::new().offering(&["v7.2.5"]));
        let server = mock.start().await.unwrap();
        let dir = tempfile::tempdir().unwrap();

        let args = fixture(dir.path(), IMAGE_NAME, &[("fw-1", "tok")]);
        let code = run_upgrade(&server, args, &mut ScriptedPrompter::default()).await;
        assert_eq!(code, ExitCode::from(EXIT_PARTIAL_FAILURE));
    }
}
