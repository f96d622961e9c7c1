//! Client for an ACE-Step server at a known URL.
use super::{build_agent, AceStepApi, MusicGenClient};
use crate::error::ClientError;
use crate::request::GenerationRequest;
use crate::result::{TaskResult, TaskSubmission};
use std::path::{Path, PathBuf};

pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8001";

/// Talks to a server that is already reachable, typically on localhost.
#[derive(Debug, Clone)]
pub struct LocalClient {
    api: AceStepApi,
}

impl LocalClient {
    /// An empty `api_key` sends no `Authorization` header.
    pub fn new(base_url: &str, api_key: &str) -> Self {
        Self {
            api: AceStepApi::new(build_agent(), base_url, api_key),
        }
    }
}

impl Default for LocalClient {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_URL, "")
    }
}

impl MusicGenClient for LocalClient {
    fn health_check(&self) -> bool {
        self.api.health_check()
    }

    fn submit_task(&self, request: &GenerationRequest) -> Result<TaskSubmission, ClientError> {
        self.api.submit_task(request)
    }

    fn poll_result(&self, task_id: &str) -> Result<TaskResult, ClientError> {
        self.api.poll_result(task_id)
    }

    fn download_audio(
        &self,
        remote_path: &str,
        local_path: &Path,
    ) -> Result<PathBuf, ClientError> {
        self.api.download_audio(remote_path, local_path)
    }

    fn base_url(&self) -> Option<&str> {
        Some(self.api.base_url())
    }
}
