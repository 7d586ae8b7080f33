use regex::Regex;
use serde_json::Value;
use std::path::Path;
use std::sync::OnceLock;
use crate::errors::AutopatchError;
use crate::models::{Severity, VulnerabilityRecord};
use tracing::{debug, info, warn};

const PACKAGE_KEYS: &[&str] = &["package", "pkg"];
const CURRENT_VERSION_KEYS: &[&str] = &["current_version", "currentVersion", "version"];
const FIXED_VERSION_KEYS: &[&str] = &["fixed_version", "fixedVersion"];
const HOSTS_KEYS: &[&str] = &["hosts", "affected_hosts", "affectedHosts"];
const IDENTIFIER_KEYS: &[&str] = &["cve", "identifier", "id"];

/// Which findings survive parsing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SeverityFilter {
    #[default]
    All,
    CriticalOnly,
}

impl SeverityFilter {
    fn admits(&self, severity: Severity) -> bool {
        match self {
            SeverityFilter::All => true,
            SeverityFilter::CriticalOnly => severity == Severity::Critical,
        }
    }
}

fn token_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9._+-]*$").expect("static regex"))
}

fn identifier_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9._-]*$").expect("static regex"))
}

/// True if `value` is usable as a package name or version. These strings
/// become trust-store directory keys, so separators and `..` are refused.
pub fn is_well_formed_token(value: &str) -> bool {
    token_re().is_match(value) && !value.contains("..")
}

/// Read and validate a scan report from disk.
pub async fn parse_report(
    path: &Path,
    filter: SeverityFilter,
) -> Result<Vec<VulnerabilityRecord>, AutopatchError> {
    let content = tokio::fs::read_to_string(path).await.map_err(|e| {
        AutopatchError::MalformedReport(format!("cannot read {}: {}", path.display(), e))
    })?;

    let is_yaml = matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("yaml") | Some("yml")
    );
    let value: Value = if is_yaml {
        serde_yaml::from_str(&content)
            .map_err(|e| AutopatchError::MalformedReport(format!("{}: {}", path.display(), e)))?
    } else {
        serde_json::from_str(&content)
            .map_err(|e| AutopatchError::MalformedReport(format!("{}: {}", path.display(), e)))?
    };

    parse_report_value(&value, filter)
}

/// Validate an already-decoded report document.
///
/// Accepts either a top-level sequence of entries or an object carrying a
/// `vulnerabilities` sequence. Individual bad entries are dropped; a bad
/// top-level shape is an error.
pub fn parse_report_value(
    value: &Value,
    filter: SeverityFilter,
) -> Result<Vec<VulnerabilityRecord>, AutopatchError> {
    let entries = match value {
        Value::Array(items) => items,
        Value::Object(map) => match map.get("vulnerabilities") {
            Some(Value::Array(items)) => items,
            Some(_) => {
                return Err(AutopatchError::MalformedReport(
                    "'vulnerabilities' is not a sequence".into(),
                ))
            }
            None => {
                return Err(AutopatchError::MalformedReport(
                    "expected a sequence of findings or a 'vulnerabilities' key".into(),
                ))
            }
        },
        _ => {
            return Err(AutopatchError::MalformedReport(
                "top-level value is not a sequence of objects".into(),
            ))
        }
    };

    if entries.iter().any(|e| !e.is_object()) {
        return Err(AutopatchError::MalformedReport(
            "report entries must be objects".into(),
        ));
    }

    let mut records = Vec::with_capacity(entries.len());
    let mut rejected = 0usize;
    for (index, entry) in entries.iter().enumerate() {
        match parse_entry(entry) {
            Ok(record) => {
                if filter.admits(record.severity) {
                    records.push(record);
                } else {
                    debug!(index, identifier = %record.identifier, severity = %record.severity, "Filtered by severity");
                }
            }
            Err(reason) => {
                rejected += 1;
                warn!(index, reason = %reason, "Rejected malformed report entry");
            }
        }
    }

    info!(total = entries.len(), accepted = records.len(), rejected, "Report parsed");
    Ok(records)
}

fn field<'a>(entry: &'a Value, keys: &[&str]) -> Option<&'a Value> {
    keys.iter().find_map(|k| entry.get(*k)).filter(|v| !v.is_null())
}

fn string_field(entry: &Value, keys: &[&str]) -> Result<Option<String>, String> {
    match field(entry, keys) {
        None => Ok(None),
        Some(Value::String(s)) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                Ok(None)
            } else {
                Ok(Some(trimmed.to_string()))
            }
        }
        Some(other) => Err(format!("'{}' has unexpected type: {}", keys[0], other)),
    }
}

fn required(entry: &Value, keys: &[&str]) -> Result<String, String> {
    string_field(entry, keys)?.ok_or_else(|| format!("missing '{}'", keys[0]))
}

fn parse_entry(entry: &Value) -> Result<VulnerabilityRecord, String> {
    let package = required(entry, PACKAGE_KEYS)?;
    let current_version = required(entry, CURRENT_VERSION_KEYS)?;
    // Tenable exports carry a single version naming the approved target
    let fixed_version = string_field(entry, FIXED_VERSION_KEYS)?.unwrap_or_else(|| current_version.clone());
    let identifier = required(entry, IDENTIFIER_KEYS)?;

    for (name, value) in [
        ("package", &package),
        ("current_version", &current_version),
        ("fixed_version", &fixed_version),
    ] {
        if !is_well_formed_token(value) {
            return Err(format!("{} '{}' is not well-formed", name, value));
        }
    }
    if !identifier_re().is_match(&identifier) {
        return Err(format!("identifier '{}' is not well-formed", identifier));
    }

    // Reports pre-filtered upstream omit severity
    let severity = match string_field(entry, &["severity"])? {
        Some(s) => s.parse::<Severity>()?,
        None => Severity::Critical,
    };

    let affected_hosts = match field(entry, HOSTS_KEYS) {
        None => Vec::new(),
        Some(Value::Array(items)) => items
            .iter()
            .map(|h| {
                h.as_str()
                    .map(|s| s.to_string())
                    .ok_or_else(|| format!("host entry is not a string: {}", h))
            })
            .collect::<Result<Vec<_>, _>>()?,
        Some(other) => return Err(format!("'hosts' is not a list: {}", other)),
    };

    Ok(VulnerabilityRecord {
        package,
        current_version,
        fixed_version,
        severity,
        affected_hosts,
        identifier,
    })
}
