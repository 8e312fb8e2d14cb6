//! Input validation for values that cross into the wall from the outside
//!
//! Every HTTP handler and configuration loader funnels raw strings and
//! numbers through these helpers before they reach the grid controller:
//! - Oversized or empty identifiers
//! - Search text used by the camera picker
//! - Collaborator base URLs
//! - Numeric settings with a lower or upper bound

use anyhow::{anyhow, Result};
use std::cmp::Ordering;

// ============================================================================
// CONSTANTS: Input Size Limits
// ============================================================================

/// Maximum length for resource IDs (camera_id, node_id, etc.)
pub const MAX_ID_LENGTH: usize = 256;

/// Maximum length for URIs (HTTP, RTSP, etc.)
pub const MAX_URI_LENGTH: usize = 4096;

/// Maximum length for names (camera names, locations, etc.)
pub const MAX_NAME_LENGTH: usize = 512;

/// Maximum length for picker search text
pub const MAX_SEARCH_LENGTH: usize = 256;

// ============================================================================
// String Validation
// ============================================================================

/// Validate string length against a maximum
pub fn validate_length(value: &str, max_length: usize, field_name: &str) -> Result<()> {
    if value.len() > max_length {
        return Err(anyhow!(
            "{} exceeds maximum length of {} bytes (got {})",
            field_name,
            max_length,
            value.len()
        ));
    }
    Ok(())
}

/// Validate non-empty string
pub fn validate_non_empty(value: &str, field_name: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(anyhow!("{} cannot be empty", field_name));
    }
    Ok(())
}

/// Validate resource ID (camera_id, etc.)
pub fn validate_id(id: &str, field_name: &str) -> Result<()> {
    validate_non_empty(id, field_name)?;
    validate_length(id, MAX_ID_LENGTH, field_name)?;

    // IDs are interpolated into stream URL paths
    if id.contains("..") || id.contains('/') || id.contains('\\') {
        return Err(anyhow!(
            "{} contains invalid characters (no path separators or '..' allowed)",
            field_name
        ));
    }

    Ok(())
}

/// Validate name (camera name, location, etc.)
pub fn validate_name(name: &str, field_name: &str) -> Result<()> {
    validate_non_empty(name, field_name)?;
    validate_length(name, MAX_NAME_LENGTH, field_name)?;
    Ok(())
}

/// Validate picker search text. Empty text is allowed and matches everything.
pub fn validate_search_text(text: &str) -> Result<()> {
    validate_length(text, MAX_SEARCH_LENGTH, "search text")
}

/// Validate a collaborator base URL
pub fn validate_uri(uri: &str, field_name: &str) -> Result<()> {
    validate_non_empty(uri, field_name)?;
    validate_length(uri, MAX_URI_LENGTH, field_name)?;

    if !(uri.starts_with("http://") || uri.starts_with("https://")) {
        return Err(anyhow!("{} must be an http(s) URL, got '{}'", field_name, uri));
    }

    let dangerous_chars = ['`', '$', ';', '|', '&', '\n', '\r'];
    if uri.chars().any(|c| dangerous_chars.contains(&c)) {
        return Err(anyhow!(
            "{} contains dangerous shell metacharacters",
            field_name
        ));
    }

    Ok(())
}

// ============================================================================
// Numeric Validation
// ============================================================================

/// Validate positive duration in seconds
pub fn validate_duration_secs(secs: u64, field_name: &str) -> Result<()> {
    if secs == 0 {
        return Err(anyhow!("{} must be greater than 0", field_name));
    }
    Ok(())
}

/// Validate value is within range
pub fn validate_range<T: PartialOrd + std::fmt::Display>(
    value: T,
    min: T,
    max: T,
    field_name: &str,
) -> Result<()> {
    // unordered values (NaN) are out of range
    let above_min = matches!(value.partial_cmp(&min), Some(Ordering::Greater | Ordering::Equal));
    let below_max = matches!(value.partial_cmp(&max), Some(Ordering::Less | Ordering::Equal));
    if !(above_min && below_max) {
        return Err(anyhow!(
            "{} must be between {} and {}, got {}",
            field_name,
            min,
            max,
            value
        ));
    }
    Ok(())
}

// ============================================================================
// Tests
// ============================================================================
