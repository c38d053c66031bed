//! Firmware version matching and operator input validators

use std::net::Ipv4Addr;
use std::sync::LazyLock;

use regex::Regex;

use crate::error::{FgtError, Result};
use crate::types::FirmwareCandidate;

static VERSION_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"v?(\d+\.\d+\.\d+)").expect("firmware version pattern is a valid regex")
});

/// Extract the firmware version from an image filename.
///
/// Finds the first `<major>.<minor>.<patch>` (optionally preceded by `v`)
/// and returns it with a `v` prefix, the form FortiOS uses in its firmware
/// catalog.
///
/// ```
/// use fgt_client::extract_version;
///
/// assert_eq!(extract_version("FGT_60F-v7.4.1.F-build2463-FORTINET.out").as_deref(), Some("v7.4.1"));
/// assert_eq!(extract_version("firmware_image.out"), None);
/// ```
pub fn extract_version(filename: &str) -> Option<String> {
    let captures = VERSION_PATTERN.captures(filename)?;
    Some(format!("v{}", &captures[1]))
}

/// First candidate whose version string equals `target` exactly
pub fn find_candidate<'a>(
    available: &'a [FirmwareCandidate],
    target: &str,
) -> Option<&'a FirmwareCandidate> {
    available.iter().find(|c| c.version == target)
}

pub fn is_valid_ipv4(input: &str) -> bool {
    input.parse::<Ipv4Addr>().is_ok()
}

/// Parse a dotted-quad IPv4 address, surrounding whitespace ignored
pub fn parse_ipv4(input: &str) -> Result<Ipv4Addr> {
    input
        .trim()
        .parse()
        .map_err(|_| FgtError::input(format!("'{}' is not a valid IPv4 address", input.trim())))
}
