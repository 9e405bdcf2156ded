use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

use crate::Frame;

pub type JobId = String;
pub type SubscriptionId = u64;
pub type Epoch = u64;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UploadRequest {
    pub target_files: Vec<String>,
    pub migrate_files: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub made_for_kids: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub visibility_setting: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upload_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SubmitResponse {
    #[serde(deserialize_with = "string_or_number")]
    pub job_id: JobId,
    #[serde(default)]
    pub total_files: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeRequest {
    pub paths: Vec<String>,
    pub new_name: String,
    pub archive_originals: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
pub struct MergeOutcome {
    #[serde(default)]
    pub merged_path: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    Submitted(Result<SubmitResponse, ApiError>),
    Frame {
        job_id: JobId,
        subscription: SubscriptionId,
        frame: Frame,
    },
    StreamEnded {
        job_id: JobId,
        subscription: SubscriptionId,
    },
    StreamFailed {
        job_id: JobId,
        subscription: SubscriptionId,
        error: ApiError,
    },
    KeepLocalResolved {
        epoch: Epoch,
        result: Result<BTreeMap<String, bool>, ApiError>,
    },
    KeepLocalSet(Result<(), ApiError>),
    MergeFinished(Result<MergeOutcome, ApiError>),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind}: {message}")]
pub struct ApiError {
    pub kind: FailureKind,
    pub message: String,
}

impl ApiError {
    pub(crate) fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureKind {
    InvalidUrl,
    HttpStatus(u16),
    Timeout,
    Network,
    Decode,
    /// A status stream line or frame grew past the configured byte limit.
    TooLarge { max_bytes: usize },
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::InvalidUrl => write!(f, "invalid url"),
            FailureKind::HttpStatus(code) => write!(f, "http status {code}"),
            FailureKind::Timeout => write!(f, "timeout"),
            FailureKind::Network => write!(f, "network error"),
            FailureKind::Decode => write!(f, "invalid response"),
            FailureKind::TooLarge { max_bytes } => {
                write!(f, "response too large (max {max_bytes} bytes per frame)")
            }
        }
    }
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Number(serde_json::Number),
    }

    Ok(match Raw::deserialize(deserializer)? {
        Raw::Text(text) => text,
        Raw::Number(number) => number.to_string(),
    })
}
