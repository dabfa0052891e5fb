//! Wire frame envelope and decoding.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::stage::StageId;

/// Stage status as it appears on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WireStatus {
    Active,
    Succeeded,
    Failed,
    Skipped,
}

/// One server-push frame describing a stage transition.
///
/// The `stage` field is kept as raw text here; name validation happens in
/// [`decode_frame`] so an unknown stage is rejected at decode time, before
/// anything downstream sees it. Unknown extra fields are ignored.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamFrame {
    pub stage: String,
    pub status: WireStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Correlation id echoed by the server for the attempt that requested
    /// the publish.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_id: Option<String>,
    /// Dashboard URL for the published content, sent with the terminal
    /// success frame.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dashboard_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<DateTime<Utc>>,
}

/// Decoded unit from the stream, after stage-name validation.
#[derive(Debug, Clone, PartialEq)]
pub struct ServerEvent {
    pub stage: StageId,
    pub status: WireStatus,
    pub message: Option<String>,
    pub error: Option<String>,
    pub local_id: Option<String>,
    pub dashboard_url: Option<String>,
}

/// Errors from decoding a raw frame.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("malformed frame: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("unknown stage: {0:?}")]
    UnknownStage(String),
}

/// Decodes one raw frame of UTF-8 text into a [`ServerEvent`].
///
/// Malformed JSON and unknown stage names are decode errors; callers drop
/// and log them rather than forwarding anything downstream.
pub fn decode_frame(text: &str) -> Result<ServerEvent, DecodeError> {
    let frame: StreamFrame = serde_json::from_str(text)?;
    let stage: StageId = frame
        .stage
        .parse()
        .map_err(|()| DecodeError::UnknownStage(frame.stage.clone()))?;
    Ok(ServerEvent {
        stage,
        status: frame.status,
        message: frame.message,
        error: frame.error,
        local_id: frame.local_id,
        dashboard_url: frame.dashboard_url,
    })
}
