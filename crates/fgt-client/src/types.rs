//! Request and response types for the FortiOS REST API

use std::fmt;
use std::net::Ipv4Addr;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Name of the SD-WAN zone created by the provisioner
pub const SDWAN_ZONE_NAME: &str = "Internet SD-WAN";

/// Destination of the IPv4 default route, as FortiOS spells it
pub const DEFAULT_ROUTE_DST: &str = "0.0.0.0 0.0.0.0";

// =============================================================================
// Generic Envelopes
// =============================================================================

/// `{"results": ...}` envelope used by both cmdb and monitor endpoints
#[derive(Debug, Clone, Deserialize)]
pub struct Results<T> {
    pub results: T,
}

// =============================================================================
// Device / Inventory Types
// =============================================================================

/// One firewall from the inventory file
#[derive(Clone, PartialEq, Eq)]
pub struct DeviceRecord {
    pub name: String,
    pub address: Ipv4Addr,
    token: String,
}

impl DeviceRecord {
    pub fn new(name: impl Into<String>, address: Ipv4Addr, token: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            address,
            token: token.into(),
        }
    }

    /// API token used as the bearer credential
    pub fn token(&self) -> &str {
        &self.token
    }
}

impl fmt::Debug for DeviceRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceRecord")
            .field("name", &self.name)
            .field("address", &self.address)
            .field("token", &"<redacted>")
            .finish()
    }
}

impl fmt::Display for DeviceRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.address)
    }
}

// =============================================================================
// Firmware Types
// =============================================================================

/// Release channel of a firmware image
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ReleaseType {
    Ga,
    Beta,
    Feature,
    Other(String),
}

impl From<String> for ReleaseType {
    fn from(value: String) -> Self {
        match value.to_ascii_lowercase().as_str() {
            "ga" => Self::Ga,
            "beta" => Self::Beta,
            "feature" => Self::Feature,
            _ => Self::Other(value),
        }
    }
}

impl From<ReleaseType> for String {
    fn from(value: ReleaseType) -> Self {
        value.to_string()
    }
}

impl fmt::Display for ReleaseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ga => write!(f, "GA"),
            Self::Beta => write!(f, "Beta"),
            Self::Feature => write!(f, "Feature"),
            Self::Other(s) => write!(f, "{}", s),
        }
    }
}

/// A firmware image the device offers for upgrade
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FirmwareCandidate {
    pub version: String,
    pub build: u64,
    pub release_type: ReleaseType,
    pub maturity: String,
    pub notes: Option<String>,
}

/// Parsed result of `GET monitor/system/firmware`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FirmwareInventory {
    /// Version currently running on the device
    pub current: Option<String>,
    /// Complete candidates in the order the device returned them
    pub available: Vec<FirmwareCandidate>,
}

/// Wire form of the firmware monitor response
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct FirmwareResults {
    #[serde(default)]
    pub current: Option<FirmwareEntry>,
    #[serde(default)]
    pub available: Vec<FirmwareEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct FirmwareEntry {
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub build: Option<u64>,
    #[serde(default, rename = "release-type")]
    pub release_type: Option<String>,
    #[serde(default)]
    pub maturity: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

impl FirmwareEntry {
    /// Entries missing version, build, release type or maturity are dropped.
    fn into_candidate(self) -> Option<FirmwareCandidate> {
        let non_empty = |s: Option<String>| s.filter(|s| !s.is_empty());
        Some(FirmwareCandidate {
            version: non_empty(self.version)?,
            build: self.build.filter(|b| *b != 0)?,
            release_type: ReleaseType::from(non_empty(self.release_type)?),
            maturity: non_empty(self.maturity)?,
            notes: self.notes,
        })
    }
}

impl From<FirmwareResults> for FirmwareInventory {
    fn from(results: FirmwareResults) -> Self {
        Self {
            current: results.current.and_then(|c| c.version),
            available: results
                .available
                .into_iter()
                .filter_map(FirmwareEntry::into_candidate)
                .collect(),
        }
    }
}

/// What the fleet is being upgraded to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpgradeRequest {
    /// Version string derived from the image filename, e.g. `v7.4.1`
    pub target_version: String,
    pub image_path: PathBuf,
}

/// Body of `POST monitor/system/firmware/upgrade`
#[derive(Debug, Clone, Serialize)]
pub struct FirmwareUploadRequest<'a> {
    pub source: &'a str,
    pub file_content: &'a str,
    pub filename: &'a str,
}

/// Body of `POST monitor/system/config/backup`
#[derive(Debug, Clone, Serialize)]
pub struct ConfigBackupRequest {
    pub destination: String,
    pub scope: String,
}

impl Default for ConfigBackupRequest {
    fn default() -> Self {
        Self {
            destination: "file".to_string(),
            scope: "global".to_string(),
        }
    }
}

// =============================================================================
// VDOM / SD-WAN / Routing Types
// =============================================================================

/// Entry of `GET cmdb/system/vdom`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vdom {
    pub name: String,
}

/// VDOM chosen for provisioning
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VdomSelection {
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NamedRef {
    pub name: String,
}

/// `PUT cmdb/system/sdwan` body creating zones
#[derive(Debug, Clone, Serialize)]
pub struct SdwanZoneUpdate {
    pub zone: Vec<NamedRef>,
}

/// `PUT cmdb/system/sdwan` body attaching members
#[derive(Debug, Clone, Serialize)]
pub struct SdwanMemberUpdate {
    pub members: Vec<SdwanMember>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SdwanMember {
    pub interface: String,
    pub zone: String,
    pub gateway: String,
}

/// Entry of `GET cmdb/router/static`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StaticRoute {
    #[serde(rename = "seq-num", alias = "seq_num")]
    pub seq_num: u64,
    #[serde(default)]
    pub dst: String,
}

/// `POST cmdb/router/static` body
#[derive(Debug, Clone, Serialize)]
pub struct NewStaticRoute {
    pub dst: String,
    pub comment: String,
    #[serde(rename = "sdwan-zone")]
    pub sdwan_zone: Vec<NamedRef>,
}

impl NewStaticRoute {
    /// Default route pointing at the given SD-WAN zone
    pub fn default_via_zone(zone: &str) -> Self {
        Self {
            dst: DEFAULT_ROUTE_DST.to_string(),
            comment: "Default static route created programmatically.".to_string(),
            sdwan_zone: vec![NamedRef {
                name: zone.to_string(),
            }],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_firmware_parsing_drops_incomplete_entries() {
        let json = serde_json::json!({
            "results": {
                "current": {"version": "v7.2.4", "build": 1396},
                "available": [
                    {"version": "v7.2.5", "build": 1517, "release-type": "GA", "maturity": "M"},
                    {"version": "v7.4.0", "build": 2360, "maturity": "F"},
                    {"version": "v7.4.1", "build": 2463, "release-type": "Feature", "maturity": "F",
                     "notes": "https://docs.fortinet.com"}
                ]
            }
        });

        let parsed: Results<FirmwareResults> = serde_json::from_value(json).unwrap();
        let inventory = FirmwareInventory::from(parsed.results);

        assert_eq!(inventory.current.as_deref(), Some("v7.2.4"));
        assert_eq!(inventory.available.len(), 2);
        assert_eq!(inventory.available[0].release_type, ReleaseType::Ga);
        assert_eq!(inventory.available[1].version, "v7.4.1");
        assert_eq!(inventory.available[1].release_type, ReleaseType::Feature);
        assert!(inventory.available[1].notes.is_some());
    }

    #[test]
    fn test_release_type_other() {
        let rt = ReleaseType::from("Interim".to_string());
        assert_eq!(rt, ReleaseType::Other("Interim".into()));
        assert_eq!(rt.to_string(), "Interim");
    }

    #[test]
    fn test_device_record_debug_redacts_token() {
        let record = DeviceRecord::new("fw-hq", Ipv4Addr::new(10, 0, 0, 1), "s3cr3t");
        let debug = format!("{:?}", record);
        assert!(!debug.contains("s3cr3t"));
        assert_eq!(record.to_string(), "fw-hq (10.0.0.1)");
    }

    #[test]
    fn test_static_route_accepts_both_seq_spellings() {
        let a: StaticRoute =
            serde_json::from_value(serde_json::json!({"seq-num": 4, "dst": DEFAULT_ROUTE_DST}))
                .unwrap();
        let b: StaticRoute = serde_json::from_value(serde_json::json!({"seq_num": 4})).unwrap();
        assert_eq!(a.seq_num, b.seq_num);
        assert_eq!(b.dst, "");
    }

    #[test]
    fn test_new_static_route_body() {
        let body = serde_json::to_value(NewStaticRoute::default_via_zone(SDWAN_ZONE_NAME)).unwrap();
        assert_eq!(body["dst"], "0.0.0.0 0.0.0.0");
        assert_eq!(body["sdwan-zone"][0]["name"], "Internet SD-WAN");
    }
}
