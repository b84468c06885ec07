//! Input validation and sanitization functions
//!
//! Every value that ends up in an argv for `nft`, `ip`, `arp`, or in one of
//! the line-oriented files read by other daemons passes through here first.
//! Validators return the canonical form of the value on success.

use std::net::Ipv4Addr;

/// Maximum zone name length. Zone names become map identifiers
/// (`<zone>_mac_src_access`), which must stay well inside nft limits.
pub const MAX_ZONE_NAME_LEN: usize = 32;

/// Minimum PSK length accepted for WPA2/SAE.
pub const MIN_PSK_LEN: usize = 8;

const MAX_DNS_LABEL_LEN: usize = 63;
const MAX_DNS_NAME_LEN: usize = 253;

/// Validates a MAC address and returns its canonical form.
///
/// # Errors
///
/// Returns `Err` unless the value is six colon-separated hex octets.
///
/// # Examples
///
/// ```
/// use zonewarden::validators::validate_mac;
///
/// assert_eq!(validate_mac(" AA:BB:CC:DD:EE:01").unwrap(), "aa:bb:cc:dd:ee:01");
/// assert!(validate_mac("aa:bb:cc").is_err());
/// ```
pub fn validate_mac(input: &str) -> Result<String, String> {
    let mac = crate::utils::canonical_mac(input);
    if mac.is_empty() {
        return Err("MAC address is required".to_string());
    }

    let octets: Vec<&str> = mac.split(':').collect();
    if octets.len() != 6
        || !octets
            .iter()
            .all(|o| o.len() == 2 && o.chars().all(|c| c.is_ascii_hexdigit()))
    {
        return Err(format!("Invalid MAC address: {mac}"));
    }

    Ok(mac)
}

/// Validates a dotted-quad IPv4 address.
///
/// # Errors
///
/// Returns `Err` if the value does not parse as an IPv4 address.
pub fn validate_ipv4(input: &str) -> Result<Ipv4Addr, String> {
    input
        .trim()
        .parse::<Ipv4Addr>()
        .map_err(|_| format!("Invalid IPv4 address: {}", input.trim()))
}

/// Validates a network interface name.
///
/// Linux kernel interface name rules:
/// - Max 15 characters (IFNAMSIZ - 1)
/// - Alphanumeric, dot, dash, underscore only
/// - Cannot be "." or ".."
///
/// # Errors
///
/// Returns `Err` if interface name is empty or violates kernel constraints.
pub fn validate_interface(name: &str) -> Result<String, String> {
    let name = name.trim();
    if name.is_empty() {
        return Err("Interface name is required".to_string());
    }

    if name.len() > 15 {
        return Err("Interface name too long (max 15 characters)".to_string());
    }

    if name == "." || name == ".." {
        return Err("Invalid interface name".to_string());
    }

    if !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_'))
    {
        return Err("Interface name contains invalid characters".to_string());
    }

    Ok(name.to_string())
}

/// Validates a zone name and returns its canonical (trimmed, lower-case) form.
///
/// Constraints:
/// - 1 to [`MAX_ZONE_NAME_LEN`] characters
/// - Starts with an ASCII letter
/// - ASCII lower-case letters, digits, and underscores only
///
/// # Errors
///
/// Returns `Err` if the name cannot be used as a map identifier.
pub fn validate_zone_name(input: &str) -> Result<String, String> {
    let name = crate::utils::trim_lower(input);
    if name.is_empty() {
        return Err("Zone name cannot be empty".to_string());
    }

    if name.len() > MAX_ZONE_NAME_LEN {
        return Err(format!(
            "Zone name too long (max {MAX_ZONE_NAME_LEN} chars)"
        ));
    }

    if !name.starts_with(|c: char| c.is_ascii_lowercase()) {
        return Err("Zone name must start with a letter".to_string());
    }

    if !name
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
    {
        return Err("Zone name contains invalid characters (use only a-z, 0-9, _)".to_string());
    }

    Ok(name)
}

/// Validates a verdict map name requested for raw listing.
///
/// # Errors
///
/// Returns `Err` if the name is empty, longer than 64 characters, or contains
/// anything but ASCII alphanumerics and underscores.
pub fn validate_map_name(name: &str) -> Result<String, String> {
    if name.is_empty() || name.len() > 64 {
        return Err("Invalid map name length".to_string());
    }

    if !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err("Map name contains invalid characters".to_string());
    }

    Ok(name.to_string())
}

/// Validates a caller-supplied PSK.
///
/// An empty PSK is accepted (one will be generated). Otherwise it must be at
/// least [`MIN_PSK_LEN`] characters and must not contain whitespace, `|`, or
/// control characters, since it is written verbatim into line-oriented
/// credential files.
///
/// # Errors
///
/// Returns `Err` if the PSK is too short or contains forbidden characters.
pub fn validate_psk(psk: &str) -> Result<(), String> {
    if psk.is_empty() {
        return Ok(());
    }

    if psk.chars().count() < MIN_PSK_LEN {
        return Err("psk too short".to_string());
    }

    if psk
        .chars()
        .any(|c| c.is_whitespace() || c.is_control() || c == '|')
    {
        return Err("psk contains invalid characters".to_string());
    }

    Ok(())
}

/// Sanitizes a free-form comment: control characters are dropped and the
/// result is limited to 128 characters.
pub fn sanitize_comment(input: &str) -> String {
    input
        .chars()
        .filter(|c| !c.is_control())
        .take(128)
        .collect::<String>()
        .trim()
        .to_string()
}

/// Sanitizes a DHCP-supplied host name for the local DNS mappings file.
///
/// Keeps ASCII alphanumerics and dashes in each dot-separated label,
/// lower-cased. Empty labels are dropped, labels are cut to 63 characters
/// and the whole name to 253.
pub fn sanitize_hostname(input: &str) -> String {
    let labels: Vec<String> = input
        .trim()
        .split('.')
        .map(|label| {
            label
                .chars()
                .filter(|c| c.is_ascii_alphanumeric() || *c == '-')
                .take(MAX_DNS_LABEL_LEN)
                .collect::<String>()
                .to_ascii_lowercase()
        })
        .filter(|label| !label.is_empty())
        .collect();

    let mut name = labels.join(".");
    if name.len() > MAX_DNS_NAME_LEN {
        name.truncate(MAX_DNS_NAME_LEN);
        name.truncate(name.trim_end_matches('.').len());
    }
    name
}
