use serde::{Deserialize, Serialize};

use crate::types::TierOfRecord;

// ---------------------------------------------------------------------------
// Request payloads
// ---------------------------------------------------------------------------

/// Requests a download stream for one object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadRequest {
    pub name: String,
}

/// Requests metadata for one object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetadataRequest {
    pub name: String,
}

/// Requests deletion of one object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteRequest {
    pub name: String,
}

// ---------------------------------------------------------------------------
// Response payloads
// ---------------------------------------------------------------------------

/// Final response to an upload call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadAck {
    pub message: String,
    pub tier_of_record: TierOfRecord,
    pub size: u64,
}

/// Sent after the last chunk frame of a download stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadDone {
    pub name: String,
    pub size: u64,
}

/// Response to a delete call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteAck {
    pub message: String,
}

/// Response to an upload cancellation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelAck {
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upload_ack_camel_case() {
        let ack = UploadAck {
            message: "stored greeting.txt".into(),
            tier_of_record: TierOfRecord::Both,
            size: 11,
        };
        let json = serde_json::to_string(&ack).unwrap();
        assert!(json.contains("tierOfRecord"));
        assert!(json.contains("\"both\""));
        let parsed: UploadAck = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, ack);
    }

    #[test]
    fn download_request_roundtrip() {
        let req = DownloadRequest {
            name: "greeting.txt".into(),
        };
        let json = serde_json::to_string(&req).unwrap();
        let parsed: DownloadRequest = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, req);
    }

    #[test]
    fn download_done_fields() {
        let done = DownloadDone {
            name: "greeting.txt".into(),
            size: 11,
        };
        let json = serde_json::to_string(&done).unwrap();
        assert!(json.contains("\"size\":11"));
    }
}
