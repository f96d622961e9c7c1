//! Clients for the ACE-Step inference API.
//!
//! Two backends implement [`MusicGenClient`]: a server reachable at a fixed URL
//! (usually one we launched locally) and a RunPod GPU pod whose URL is only
//! known once the pod is running. Both speak the same wire protocol through
//! [`AceStepApi`]:
//!
//! - `GET /health`: 200 means ready.
//! - `POST /release_task`: canonical request payload, returns the submission.
//! - `POST /query_result`: `{"task_id_list": [id]}`, returns a list of result items.
//! - `GET /v1/audio?path=<encoded>`: raw audio bytes.
//!
//! Every JSON response is wrapped in a `{data, code, error}` envelope.
#[cfg(test)]
pub(crate) mod fake;
pub mod local;
pub mod pod;

use crate::error::ClientError;
use crate::request::GenerationRequest;
use crate::result::{TaskResult, TaskSubmission};
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use serde::Deserialize;
use serde_json::{json, Value};
use std::fs::{self, File};
use std::io::{self, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;
use ureq::{Agent, RequestBuilder};

pub use local::LocalClient;
pub use pod::{PodClient, RunPodProvider};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const RESPONSE_TIMEOUT: Duration = Duration::from_secs(30);

/// Characters left as-is in the audio path query value (RFC 3986 unreserved).
const QUERY_VALUE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

/// Operations the wizard needs from a generation backend.
pub trait MusicGenClient {
    /// True only when `/health` answers 200. Never fails.
    fn health_check(&self) -> bool;

    fn submit_task(&self, request: &GenerationRequest) -> Result<TaskSubmission, ClientError>;

    fn poll_result(&self, task_id: &str) -> Result<TaskResult, ClientError>;

    /// Stream a remote file to `local_path`, creating parent directories.
    fn download_audio(&self, remote_path: &str, local_path: &Path)
        -> Result<PathBuf, ClientError>;

    /// Resolved server URL, if any.
    fn base_url(&self) -> Option<&str>;
}

/// HTTP agent with connect/response timeouts. Body reads are unbounded so
/// large downloads are not cut off.
pub(crate) fn build_agent() -> Agent {
    Agent::config_builder()
        .timeout_connect(Some(CONNECT_TIMEOUT))
        .timeout_recv_response(Some(RESPONSE_TIMEOUT))
        .build()
        .into()
}

#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(default)]
    data: Value,
    #[serde(default)]
    code: Option<i64>,
    #[serde(default)]
    error: Option<Value>,
}

impl Envelope {
    fn describe_missing_data(&self) -> String {
        match (&self.error, self.code) {
            (Some(error), _) if !error.is_null() => format!("server error: {error}"),
            (_, Some(code)) => format!("no data in response (code {code})"),
            _ => "no data in response".to_string(),
        }
    }
}

/// Wire protocol shared by both backends.
#[derive(Debug, Clone)]
pub(crate) struct AceStepApi {
    agent: Agent,
    base_url: String,
    api_key: String,
}

impl AceStepApi {
    pub(crate) fn new(agent: Agent, base_url: &str, api_key: &str) -> Self {
        Self {
            agent,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        }
    }

    pub(crate) fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    fn authorize<B>(&self, request: RequestBuilder<B>) -> RequestBuilder<B> {
        if self.api_key.is_empty() {
            request
        } else {
            request.header("Authorization", format!("Bearer {}", self.api_key))
        }
    }

    pub(crate) fn health_check(&self) -> bool {
        match self.authorize(self.agent.get(self.url("/health"))).call() {
            Ok(response) => response.status().as_u16() == 200,
            Err(err) => {
                tracing::debug!(base_url = %self.base_url, error = %err, "health check failed");
                false
            }
        }
    }

    fn post_json(&self, path: &str, body: &Value) -> Result<Value, ClientError> {
        let mut response = self
            .authorize(self.agent.post(self.url(path)))
            .send_json(body)
            .map_err(|err| ClientError::transport(path, err))?;
        let envelope: Envelope = response
            .body_mut()
            .read_json()
            .map_err(|err| ClientError::Payload(format!("{path}: {err}")))?;
        if envelope.data.is_null() {
            return Err(ClientError::Payload(format!(
                "{path}: {}",
                envelope.describe_missing_data()
            )));
        }
        Ok(envelope.data)
    }

    pub(crate) fn submit_task(
        &self,
        request: &GenerationRequest,
    ) -> Result<TaskSubmission, ClientError> {
        let payload = Value::Object(request.to_api_payload());
        let data = self.post_json("/release_task", &payload)?;
        let submission: TaskSubmission = serde_json::from_value(data)
            .map_err(|err| ClientError::Payload(format!("/release_task: {err}")))?;
        tracing::info!(
            task_id = %submission.task_id,
            queue_position = submission.queue_position,
            "task submitted"
        );
        Ok(submission)
    }

    pub(crate) fn poll_result(&self, task_id: &str) -> Result<TaskResult, ClientError> {
        let data = self.post_json("/query_result", &json!({ "task_id_list": [task_id] }))?;
        let item = data
            .as_array()
            .and_then(|items| items.first())
            .unwrap_or(&Value::Null);
        let mut result = TaskResult::from_api_item(item);
        if result.task_id.is_empty() {
            result.task_id = task_id.to_string();
        }
        tracing::debug!(task_id, status = result.status.code(), "polled task");
        Ok(result)
    }

    pub(crate) fn download_audio(
        &self,
        remote_path: &str,
        local_path: &Path,
    ) -> Result<PathBuf, ClientError> {
        let url = self.url(&audio_path_query(remote_path));
        let response = self
            .authorize(self.agent.get(url))
            .call()
            .map_err(|err| ClientError::transport("/v1/audio", err))?;
        let mut reader = response.into_body().into_reader();
        let bytes = stream_to_file(&mut reader, local_path)?;
        tracing::info!(remote_path, local_path = %local_path.display(), bytes, "downloaded audio");
        Ok(local_path.to_path_buf())
    }
}

/// Copy `reader` into `local_path`, creating parent directories. A partial
/// file is removed when the copy fails.
pub(crate) fn stream_to_file(reader: &mut dyn Read, local_path: &Path) -> io::Result<u64> {
    if let Some(parent) = local_path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut writer = BufWriter::new(File::create(local_path)?);
    let copied = io::copy(reader, &mut writer).and_then(|bytes| writer.flush().map(|()| bytes));
    drop(writer);
    if let Err(err) = &copied {
        tracing::warn!(local_path = %local_path.display(), error = %err, "download interrupted");
        if let Err(remove_err) = fs::remove_file(local_path) {
            tracing::debug!(error = %remove_err, "could not remove partial download");
        }
    }
    copied
}

/// `/v1/audio?path=...` with the remote path percent-encoded, `/` included.
pub(crate) fn audio_path_query(remote_path: &str) -> String {
    format!(
        "/v1/audio?path={}",
        utf8_percent_encode(remote_path, QUERY_VALUE)
    )
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
