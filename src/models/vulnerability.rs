use serde::{Deserialize, Serialize};

/// Severity level reported by the scanner, ordered from least to most severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        }
    }
}

impl std::str::FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(Severity::Low),
            "medium" => Ok(Severity::Medium),
            "high" => Ok(Severity::High),
            "critical" => Ok(Severity::Critical),
            other => Err(format!("unknown severity '{}'", other)),
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single finding from the scan report, validated and normalized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VulnerabilityRecord {
    pub package: String,
    /// Version currently deployed; used for the usage signature.
    pub current_version: String,
    /// Version of the approved replacement in the trust store.
    pub fixed_version: String,
    pub severity: Severity,
    pub affected_hosts: Vec<String>,
    /// Advisory identifier, usually a CVE id.
    pub identifier: String,
}

impl VulnerabilityRecord {
    /// Name+version signature of the vulnerable artifact.
    pub fn vulnerable_signature(&self) -> String {
        format!("{}-{}", self.package, self.current_version)
    }

    /// The report gave a single version, the approved target, so the
    /// deployed version is unknown.
    pub fn names_target_only(&self) -> bool {
        self.current_version == self.fixed_version
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_ordering() {
        assert!(Severity::Low < Severity::Medium);
        assert!(Severity::High < Severity::Critical);
    }

    #[test]
    fn test_severity_parse_is_case_insensitive() {
        assert_eq!("CRITICAL".parse::<Severity>().unwrap(), Severity::Critical);
        assert_eq!(" high ".parse::<Severity>().unwrap(), Severity::High);
        assert!("urgent".parse::<Severity>().is_err());
    }

    #[test]
    fn test_vulnerable_signature() {
        let record = VulnerabilityRecord {
            package: "log4j".into(),
            current_version: "2.14.1".into(),
            fixed_version: "2.17.0".into(),
            severity: Severity::Critical,
            affected_hosts: vec![],
            identifier: "CVE-2021-44228".into(),
        };
        assert_eq!(record.vulnerable_signature(), "log4j-2.14.1");
        assert!(!record.names_target_only());

        let tenable = VulnerabilityRecord { current_version: "2.17.0".into(), ..record };
        assert!(tenable.names_target_only());
    }
}
