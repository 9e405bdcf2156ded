//! Tracker engine: server client, status stream decoding and subscription management.
mod client;
mod engine;
mod frame;
mod registry;
mod types;

pub use client::{
    parse_base_url, ApiSettings, ByteStream, ReqwestUploadApi, UploadApi, ACTION_PATH,
    KEEP_LOCAL_QUERY_PATH, KEEP_LOCAL_SET_PATH, STATUS_STREAM_PATH, UPLOAD_PATH,
};
pub use engine::EngineHandle;
pub use frame::{frame_stream, Frame, FrameParser, DEFAULT_MAX_FRAME_BYTES, EVENT_KEY};
pub use registry::JobRegistry;
pub use types::{
    ApiError, EngineEvent, Epoch, FailureKind, JobId, MergeOutcome, MergeRequest,
    SubmitResponse, SubscriptionId, UploadRequest,
};
