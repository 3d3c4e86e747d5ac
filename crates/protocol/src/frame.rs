//! Binary chunk frames: 4-byte big-endian header length + JSON header + raw payload.
//!
//! Chunk payloads never travel inside JSON; each chunk of an upload or
//! download stream is one binary WebSocket frame in this format.

use serde::{Deserialize, Serialize};

/// Header for a binary chunk frame.
///
/// `id` correlates the chunk with its call: the upload call id chosen by
/// the client, or the download request id echoed by the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkHeader {
    pub id: String,
    pub name: String,
    /// SHA-256 hex digest of the payload (empty means no verification).
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub checksum: String,
}

/// Parses a raw binary WebSocket frame into a chunk header and payload.
///
/// Wire format: `[4 bytes: header_len (big-endian)][header_len bytes: JSON][rest: payload]`
pub fn parse_chunk_frame(data: &[u8]) -> Result<(ChunkHeader, Vec<u8>), FrameError> {
    if data.len() < 4 {
        return Err(FrameError::TooShort);
    }

    let header_len = u32::from_be_bytes([data[0], data[1], data[2], data[3]]) as usize;

    if data.len() < 4 + header_len {
        return Err(FrameError::HeaderTruncated {
            expected: header_len,
            got: data.len() - 4,
        });
    }

    let header: ChunkHeader = serde_json::from_slice(&data[4..4 + header_len])
        .map_err(|e| FrameError::InvalidJson(e.to_string()))?;
    let payload = data[4 + header_len..].to_vec();

    Ok((header, payload))
}

/// Encodes a chunk frame for sending over WebSocket.
pub fn encode_chunk_frame(header: &ChunkHeader, payload: &[u8]) -> Result<Vec<u8>, FrameError> {
    let header_json =
        serde_json::to_vec(header).map_err(|e| FrameError::InvalidJson(e.to_string()))?;
    let header_len = header_json.len() as u32;

    let mut buf = Vec::with_capacity(4 + header_json.len() + payload.len());
    buf.extend_from_slice(&header_len.to_be_bytes());
    buf.extend_from_slice(&header_json);
    buf.extend_from_slice(payload);
    Ok(buf)
}

/// Errors from chunk frame parsing.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("frame too short (need at least 4 bytes)")]
    TooShort,

    #[error("header truncated: expected {expected} bytes, got {got}")]
    HeaderTruncated { expected: usize, got: usize },

    #[error("invalid header JSON: {0}")]
    InvalidJson(String),
}
