//! Output formatting for fgt-cli (table, json, csv)

use anyhow::Result;
use clap::ValueEnum;
use colored::Colorize;
use fgt_client::provision::{StageReport, StageStatus};
use fgt_client::upgrade::BackupOutcome;
use fgt_client::{DeviceUpgrade, FirmwareInventory, RecordError, UpgradeState};
use serde::Serialize;
use std::io::{self, Write};
use tabled::{Table, Tabled};

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    /// ASCII table format (default)
    #[default]
    Table,
    /// JSON format
    Json,
    /// CSV format
    Csv,
}

/// Console lines and report rendering for one command run
pub struct OutputContext {
    pub format: OutputFormat,
    pub quiet: bool,
}

impl OutputContext {
    pub fn new(format: OutputFormat, no_color: bool, quiet: bool) -> Self {
        if no_color {
            colored::control::set_override(false);
        }
        Self { format, quiet }
    }

    /// True when stdout carries a machine-readable report
    pub fn is_structured(&self) -> bool {
        self.format != OutputFormat::Table
    }

    fn shows_progress(&self) -> bool {
        !self.quiet && !self.is_structured()
    }

    pub fn success(&self, msg: &str) {
        if self.shows_progress() {
            println!("{}", msg.green());
        }
    }

    pub fn info(&self, msg: &str) {
        if self.shows_progress() {
            println!("{}", msg);
        }
    }

    /// Warnings and errors go to stderr regardless of format or quiet mode
    pub fn warn(&self, msg: &str) {
        eprintln!("{}", msg.yellow());
    }

    pub fn error(&self, msg: &str) {
        eprintln!("{}", msg.red());
    }

    /// Write report rows to stdout
    pub fn print<T: Tabled + Serialize>(&self, rows: &[T]) -> Result<()> {
        let stdout = io::stdout();
        let mut out = stdout.lock();
        self.render(rows, &mut out)?;
        out.flush()?;
        Ok(())
    }

    fn render<T, W>(&self, rows: &[T], out: &mut W) -> Result<()>
    where
        T: Tabled + Serialize,
        W: Write,
    {
        match self.format {
            OutputFormat::Table if rows.is_empty() => {
                if !self.quiet {
                    writeln!(out, "No data")?;
                }
            }
            OutputFormat::Table => writeln!(out, "{}", Table::new(rows))?,
            OutputFormat::Json => {
                serde_json::to_writer_pretty(&mut *out, rows)?;
                writeln!(out)?;
            }
            OutputFormat::Csv => {
                let mut writer = csv::Writer::from_writer(&mut *out);
                for row in rows {
                    writer.serialize(row)?;
                }
                writer.flush()?;
            }
        }
        Ok(())
    }

    /// Print the catalog the way operators compare versions
    pub fn print_catalog(&self, catalog: &FirmwareInventory) {
        self.info("Firmware Versions:");
        self.info(&format!(
            "0. Current Version: {}",
            catalog.current.as_deref().unwrap_or("unknown")
        ));
        for (i, fw) in catalog.available.iter().enumerate() {
            self.info(&format!(
                "{}. Version: {}, Build: {}, Release Type: {}, Maturity: {}",
                i + 1,
                fw.version,
                fw.build,
                fw.release_type,
                fw.maturity
            ));
        }
    }
}

// =============================================================================
// Display types for the summaries
// =============================================================================

/// One line of the upgrade summary
#[derive(Debug, Tabled, Serialize)]
pub struct DeviceRow {
    #[tabled(rename = "Firewall")]
    pub device: String,
    #[tabled(rename = "Address")]
    pub address: String,
    #[tabled(rename = "Current")]
    pub current: String,
    #[tabled(rename = "Result")]
    pub result: String,
    #[tabled(rename = "Backup")]
    pub backup: String,
    #[tabled(rename = "Detail")]
    pub detail: String,
}

impl DeviceRow {
    pub fn from_upgrade(upgrade: &DeviceUpgrade, target_version: &str) -> Self {
        let detail = match (&upgrade.state, &upgrade.failure) {
            (UpgradeState::Failed, Some((step, failure))) => {
                format!("{} failed: {}", step, failure)
            }
            (UpgradeState::NotFound, _) => format!("{} not offered", target_version),
            (UpgradeState::Done, _) => match &upgrade.file_id {
                Some(id) => format!("file id {}", id),
                None => "image accepted".to_string(),
            },
            _ => String::new(),
        };

        Self {
            device: upgrade.device.clone(),
            address: upgrade.address.to_string(),
            current: upgrade
                .current_version
                .clone()
                .unwrap_or_else(|| "-".to_string()),
            result: upgrade.state.to_string(),
            backup: match &upgrade.backup {
                BackupOutcome::NotAttempted => "-".to_string(),
                BackupOutcome::Saved(path) => path.display().to_string(),
                BackupOutcome::Failed(_) => "failed".to_string(),
            },
            detail,
        }
    }

    pub fn from_skipped(error: &RecordError) -> Self {
        Self {
            device: error.name.clone().unwrap_or_else(|| "-".to_string()),
            address: "-".to_string(),
            current: "-".to_string(),
            result: "Skipped".to_string(),
            backup: "-".to_string(),
            detail: error.to_string(),
        }
    }
}

/// One provisioning stage
#[derive(Debug, Tabled, Serialize)]
pub struct StageRow {
    #[tabled(rename = "Stage")]
    pub stage: String,
    #[tabled(rename = "Result")]
    pub result: String,
    #[tabled(rename = "Detail")]
    pub detail: String,
}

impl From<&StageReport> for StageRow {
    fn from(report: &StageReport) -> Self {
        let (result, detail) = match &report.status {
            StageStatus::Succeeded(msg) => ("ok", msg.clone()),
            StageStatus::Failed(failure) => ("failed", failure.to_string()),
            StageStatus::Skipped => ("skipped", String::new()),
        };
        Self {
            stage: report.stage.to_string(),
            result: result.to_string(),
            detail,
        }
    }
}
