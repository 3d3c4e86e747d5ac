use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Which tier(s) hold the authoritative copy of an object after a write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TierOfRecord {
    #[serde(rename = "primary")]
    Primary,
    #[serde(rename = "fallback")]
    Fallback,
    #[serde(rename = "both")]
    Both,
}

impl std::fmt::Display for TierOfRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TierOfRecord::Primary => "primary",
            TierOfRecord::Fallback => "fallback",
            TierOfRecord::Both => "both",
        };
        f.write_str(s)
    }
}

/// Metadata for a stored object, as reported by whichever tier answered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectInfo {
    pub name: String,
    pub size: u64,
    pub last_modified: DateTime<Utc>,
    /// Opaque version tag (HTTP ETag or a local-disk equivalent).
    pub version: String,
    pub tier_of_record: TierOfRecord,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tier_of_record_serialization() {
        assert_eq!(
            serde_json::to_string(&TierOfRecord::Both).unwrap(),
            "\"both\""
        );
        let t: TierOfRecord = serde_json::from_str("\"fallback\"").unwrap();
        assert_eq!(t, TierOfRecord::Fallback);
    }

    #[test]
    fn tier_of_record_display() {
        assert_eq!(TierOfRecord::Primary.to_string(), "primary");
        assert_eq!(TierOfRecord::Both.to_string(), "both");
    }

    #[test]
    fn object_info_roundtrip() {
        let info = ObjectInfo {
            name: "report.pdf".into(),
            size: 4096,
            last_modified: Utc::now(),
            version: "5f2c-1000".into(),
            tier_of_record: TierOfRecord::Primary,
        };
        let json = serde_json::to_string(&info).unwrap();
        assert!(json.contains("lastModified"));
        assert!(json.contains("tierOfRecord"));
        let parsed: ObjectInfo = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, info);
    }
}
