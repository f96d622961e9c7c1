//! Scripted in-memory backend for tests.
use super::pod::{PodProvider, PodSpec, PodState};
use super::MusicGenClient;
use crate::error::ClientError;
use crate::request::GenerationRequest;
use crate::result::{TaskResult, TaskStatus, TaskSubmission};
use serde_json::{Map, Value};
use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::fs;
use std::path::{Path, PathBuf};

/// Poll snapshots are served in order; once exhausted every poll reports
/// a running task.
pub struct FakeClient {
    pub healthy: Cell<bool>,
    pub base_url: Option<String>,
    pub audio_bytes: Vec<u8>,
    pub submissions: RefCell<Vec<Map<String, Value>>>,
    pub downloads: RefCell<Vec<(String, PathBuf)>>,
    pub polls: Cell<usize>,
    submit_errors: RefCell<VecDeque<ClientError>>,
    scripted: RefCell<VecDeque<Result<TaskResult, ClientError>>>,
}

impl FakeClient {
    pub fn new() -> Self {
        Self {
            healthy: Cell::new(true),
            base_url: Some("http://fake:8001".to_string()),
            audio_bytes: b"ID3fake".to_vec(),
            submissions: RefCell::new(Vec::new()),
            downloads: RefCell::new(Vec::new()),
            polls: Cell::new(0),
            submit_errors: RefCell::new(VecDeque::new()),
            scripted: RefCell::new(VecDeque::new()),
        }
    }

    pub fn push_result(&self, result: Result<TaskResult, ClientError>) {
        self.scripted.borrow_mut().push_back(result);
    }

    pub fn push_running(&self, count: usize, progress_text: &str) {
        for _ in 0..count {
            self.push_result(Ok(running(progress_text)));
        }
    }

    /// The next submit fails with `err`.
    pub fn fail_next_submit(&self, err: ClientError) {
        self.submit_errors.borrow_mut().push_back(err);
    }
}

impl Default for FakeClient {
    fn default() -> Self {
        Self::new()
    }
}

pub fn running(progress_text: &str) -> TaskResult {
    TaskResult {
        task_id: "task-1".to_string(),
        status: TaskStatus::Running,
        progress_text: progress_text.to_string(),
        ..TaskResult::default()
    }
}

impl MusicGenClient for FakeClient {
    fn health_check(&self) -> bool {
        self.healthy.get()
    }

    fn submit_task(&self, request: &GenerationRequest) -> Result<TaskSubmission, ClientError> {
        if let Some(err) = self.submit_errors.borrow_mut().pop_front() {
            return Err(err);
        }
        let mut submissions = self.submissions.borrow_mut();
        submissions.push(request.to_api_payload());
        Ok(TaskSubmission {
            task_id: format!("task-{}", submissions.len()),
            status: "queued".to_string(),
            queue_position: 0,
        })
    }

    fn poll_result(&self, _task_id: &str) -> Result<TaskResult, ClientError> {
        self.polls.set(self.polls.get() + 1);
        self.scripted
            .borrow_mut()
            .pop_front()
            .unwrap_or_else(|| Ok(running("")))
    }

    fn download_audio(
        &self,
        remote_path: &str,
        local_path: &Path,
    ) -> Result<PathBuf, ClientError> {
        if let Some(parent) = local_path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(local_path, &self.audio_bytes)?;
        self.downloads
            .borrow_mut()
            .push((remote_path.to_string(), local_path.to_path_buf()));
        Ok(local_path.to_path_buf())
    }

    fn base_url(&self) -> Option<&str> {
        self.base_url.as_deref()
    }
}

/// Pod provider that serves scripted states; the last state repeats.
#[derive(Default)]
pub struct FakePodProvider {
    pub states: RefCell<VecDeque<PodState>>,
    pub created: RefCell<Vec<PodSpec>>,
    pub terminated: RefCell<Vec<String>>,
}

impl FakePodProvider {
    pub fn with_states(states: Vec<PodState>) -> Self {
        Self {
            states: RefCell::new(states.into()),
            ..Self::default()
        }
    }
}

impl PodProvider for &FakePodProvider {
    fn create(&self, spec: &PodSpec) -> Result<String, ClientError> {
        self.created.borrow_mut().push(spec.clone());
        Ok("pod-abc123".to_string())
    }

    fn get(&self, _pod_id: &str) -> Result<PodState, ClientError> {
        let mut states = self.states.borrow_mut();
        let state = if states.len() > 1 {
            states.pop_front()
        } else {
            states.front().cloned()
        };
        Ok(state.unwrap_or_default())
    }

    fn terminate(&self, pod_id: &str) -> Result<(), ClientError> {
        self.terminated.borrow_mut().push(pod_id.to_string());
        Ok(())
    }
}
