//! JSON serialization for suite reports.

use crate::result::SuiteReport;

/// Serialize a SuiteReport to a compact JSON string.
///
/// # Errors
///
/// Returns an error if serialization fails (should not happen for SuiteReport).
pub fn to_json(report: &SuiteReport) -> Result<String, serde_json::Error> {
    serde_json::to_string(report)
}

/// Serialize a SuiteReport to a pretty-printed JSON string.
///
/// # Errors
///
/// Returns an error if serialization fails (should not happen for SuiteReport).
pub fn to_json_pretty(report: &SuiteReport) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(report)
}
