//! Firewall inventory file
//!
//! A CSV file with a header row naming the columns `fgt_name`, `fw_ip` and
//! `api_token` (any order, extra columns ignored). Fields follow RFC 4180
//! quoting, so names and tokens may contain commas or line breaks:
//!
//! ```text
//! fgt_name,fw_ip,api_token
//! fw-hq,10.0.0.1,9h6k...
//! fw-branch,10.0.1.1,p0q3...
//! ```

use std::path::Path;

use tracing::debug;

use crate::error::{FgtError, RecordError, Result};
use crate::types::DeviceRecord;
use crate::version::parse_ipv4;

pub const NAME_COLUMN: &str = "fgt_name";
pub const ADDRESS_COLUMN: &str = "fw_ip";
pub const TOKEN_COLUMN: &str = "api_token";

/// Rows of an inventory file in file order
///
/// Malformed rows are kept in place as errors so that a run can report them
/// without reordering the devices around them.
#[derive(Debug, Clone, Default)]
pub struct Inventory {
    pub entries: Vec<std::result::Result<DeviceRecord, RecordError>>,
}

impl Inventory {
    /// Load an inventory file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            FgtError::Io(std::io::Error::new(
                e.kind(),
                format!("{}: {}", path.display(), e),
            ))
        })?;
        Self::parse(&content)
    }

    /// Parse inventory CSV content
    ///
    /// Fails only when the header is missing or lacks a required column.
    pub fn parse(content: &str) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(content.trim_start_matches('\u{feff}').as_bytes());

        let header = reader.headers()?.clone();
        if header.iter().all(str::is_empty) {
            return Err(FgtError::input("inventory file is empty"));
        }

        let column = |name: &str| {
            header
                .iter()
                .position(|h| h == name)
                .ok_or_else(|| FgtError::input(format!("inventory header has no '{}' column", name)))
        };
        let name_idx = column(NAME_COLUMN)?;
        let address_idx = column(ADDRESS_COLUMN)?;
        let token_idx = column(TOKEN_COLUMN)?;

        let mut entries = Vec::new();
        for result in reader.records() {
            let record = match result {
                Ok(record) => record,
                Err(e) => {
                    entries.push(Err(RecordError {
                        line: e.position().map(|p| p.line() as usize).unwrap_or_default(),
                        name: None,
                        reason: e.to_string(),
                    }));
                    continue;
                }
            };
            if record.iter().all(str::is_empty) {
                continue;
            }

            let line = record
                .position()
                .map(|p| p.line() as usize)
                .unwrap_or_default();
            let field = |idx: usize| record.get(idx).unwrap_or("");
            entries.push(parse_record(
                line,
                field(name_idx),
                field(address_idx),
                field(token_idx),
            ));
        }

        debug!("Parsed inventory with {} rows", entries.len());
        Ok(Self { entries })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Well-formed device records
    pub fn devices(&self) -> impl Iterator<Item = &DeviceRecord> {
        self.entries.iter().filter_map(|e| e.as_ref().ok())
    }

    /// Rows that could not be used
    pub fn errors(&self) -> impl Iterator<Item = &RecordError> {
        self.entries.iter().filter_map(|e| e.as_ref().err())
    }
}

fn parse_record(
    line: usize,
    name: &str,
    address: &str,
    token: &str,
) -> std::result::Result<DeviceRecord, RecordError> {
    let error = |reason: String| RecordError {
        line,
        name: (!name.is_empty()).then(|| name.to_string()),
        reason,
    };

    let missing: Vec<&str> = [
        (NAME_COLUMN, name),
        (ADDRESS_COLUMN, address),
        (TOKEN_COLUMN, token),
    ]
    .iter()
    .filter(|(_, value)| value.is_empty())
    .map(|(column, _)| *column)
    .collect();

    if !missing.is_empty() {
        let who = if name.is_empty() { "<unnamed>" } else { name };
        return Err(error(format!(
            "missing {} for firewall '{}'",
            missing.join(", "),
            who
        )));
    }

    let address = parse_ipv4(address).map_err(|e| error(e.to_string()))?;
    Ok(DeviceRecord::new(name, address, token))
}
