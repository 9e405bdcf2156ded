use std::collections::BTreeMap;
use std::time::Duration;

use bytes::Bytes;
use futures_util::stream::{BoxStream, StreamExt};
use reqwest::header::ACCEPT;
use reqwest::{Response, Url};
use serde::de::DeserializeOwned;
use serde_json::json;

use crate::frame::DEFAULT_MAX_FRAME_BYTES;
use crate::{ApiError, FailureKind, MergeOutcome, MergeRequest, SubmitResponse, UploadRequest};

pub const UPLOAD_PATH: &str = "api/upload";
pub const STATUS_STREAM_PATH: &str = "api/upload/stream";
pub const KEEP_LOCAL_QUERY_PATH: &str = "api/keep_local/query";
pub const KEEP_LOCAL_SET_PATH: &str = "api/keep_local/set";
pub const ACTION_PATH: &str = "api/action";

pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Raw body chunks of a status stream.
pub type ByteStream = BoxStream<'static, Result<Bytes, ApiError>>;

#[derive(Debug, Clone)]
pub struct ApiSettings {
    pub base_url: Url,
    pub connect_timeout: Duration,
    /// Applies to unary calls only; status streams stay open as long as the server keeps them.
    pub request_timeout: Duration,
    /// Largest status stream line or frame accepted before the stream fails.
    pub max_frame_bytes: usize,
}

impl ApiSettings {
    /// Settings for `base_url` with the default timeouts and frame limit.
    pub fn new(base_url: &str) -> Result<Self, ApiError> {
        Ok(Self {
            base_url: parse_base_url(base_url)?,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            max_frame_bytes: DEFAULT_MAX_FRAME_BYTES,
        })
    }
}

/// Server endpoints the tracker talks to.
#[async_trait::async_trait]
pub trait UploadApi: Send + Sync {
    async fn submit_upload(&self, request: &UploadRequest) -> Result<SubmitResponse, ApiError>;

    async fn open_status_stream(&self, job_id: &str) -> Result<ByteStream, ApiError>;

    async fn query_keep_local(&self, paths: &[String]) -> Result<BTreeMap<String, bool>, ApiError>;

    async fn set_keep_local(&self, paths: &[String], designation: bool) -> Result<(), ApiError>;

    async fn merge_clips(&self, request: &MergeRequest) -> Result<MergeOutcome, ApiError>;
}

#[derive(Debug, Clone)]
pub struct ReqwestUploadApi {
    settings: ApiSettings,
    client: reqwest::Client,
}

impl ReqwestUploadApi {
    pub fn new(settings: ApiSettings) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder()
            .connect_timeout(settings.connect_timeout)
            .build()
            .map_err(|err| ApiError::new(FailureKind::Network, err.to_string()))?;
        Ok(Self { settings, client })
    }

    fn endpoint(&self, path: &str) -> Result<Url, ApiError> {
        self.settings
            .base_url
            .join(path)
            .map_err(|err| ApiError::new(FailureKind::InvalidUrl, err.to_string()))
    }

    async fn post_json<T: DeserializeOwned>(
        &self,
        path: &str,
        body: &serde_json::Value,
    ) -> Result<T, ApiError> {
        let response = self
            .client
            .post(self.endpoint(path)?)
            .timeout(self.settings.request_timeout)
            .json(body)
            .send()
            .await
            .map_err(map_reqwest_error)?;
        let response = ensure_success(response).await?;
        response
            .json::<T>()
            .await
            .map_err(|err| ApiError::new(FailureKind::Decode, err.to_string()))
    }
}

#[async_trait::async_trait]
impl UploadApi for ReqwestUploadApi {
    async fn submit_upload(&self, request: &UploadRequest) -> Result<SubmitResponse, ApiError> {
        let body = serde_json::to_value(request)
            .map_err(|err| ApiError::new(FailureKind::Decode, err.to_string()))?;
        self.post_json(UPLOAD_PATH, &body).await
    }

    async fn open_status_stream(&self, job_id: &str) -> Result<ByteStream, ApiError> {
        let mut url = self.endpoint(STATUS_STREAM_PATH)?;
        url.query_pairs_mut().append_pair("job_id", job_id);

        let response = self
            .client
            .get(url)
            .header(ACCEPT, "text/event-stream")
            .send()
            .await
            .map_err(map_reqwest_error)?;
        let response = ensure_success(response).await?;
        Ok(response
            .bytes_stream()
            .map(|chunk| chunk.map_err(map_reqwest_error))
            .boxed())
    }

    async fn query_keep_local(&self, paths: &[String]) -> Result<BTreeMap<String, bool>, ApiError> {
        self.post_json(KEEP_LOCAL_QUERY_PATH, &json!({ "target_files": paths }))
            .await
    }

    async fn set_keep_local(&self, paths: &[String], designation: bool) -> Result<(), ApiError> {
        let _ack: serde_json::Value = self
            .post_json(
                KEEP_LOCAL_SET_PATH,
                &json!({ "target_files": paths, "designation": designation }),
            )
            .await?;
        Ok(())
    }

    async fn merge_clips(&self, request: &MergeRequest) -> Result<MergeOutcome, ApiError> {
        let primary = request
            .paths
            .first()
            .ok_or_else(|| ApiError::new(FailureKind::Decode, "merge needs at least one clip"))?;
        self.post_json(
            ACTION_PATH,
            &json!({
                "action": "merge",
                "path": primary,
                "paths": request.paths,
                "new_name": request.new_name,
                "archive_originals": request.archive_originals,
            }),
        )
        .await
    }
}

/// Parses a base URL, making sure relative endpoint paths join beneath it.
pub fn parse_base_url(raw: &str) -> Result<Url, ApiError> {
    let mut url =
        Url::parse(raw.trim()).map_err(|err| ApiError::new(FailureKind::InvalidUrl, err.to_string()))?;
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

async fn ensure_success(response: Response) -> Result<Response, ApiError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<serde_json::Value>(&body)
        .ok()
        .and_then(|value| value.get("error").and_then(|e| e.as_str()).map(str::to_string))
        .unwrap_or_else(|| status.to_string());
    Err(ApiError::new(FailureKind::HttpStatus(status.as_u16()), message))
}

fn map_reqwest_error(err: reqwest::Error) -> ApiError {
    if err.is_timeout() {
        return ApiError::new(FailureKind::Timeout, err.to_string());
    }
    if err.is_decode() {
        return ApiError::new(FailureKind::Decode, err.to_string());
    }
    ApiError::new(FailureKind::Network, err.to_string())
}
