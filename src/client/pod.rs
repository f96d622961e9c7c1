//! RunPod-backed client.
//!
//! The ACE-Step API is only reachable once a pod is provisioned and running,
//! so every API call fails with a precondition error until `wait_for_pod`
//! has resolved the proxy URL.
use super::{build_agent, AceStepApi, MusicGenClient};
use crate::clock::Clock;
use crate::error::ClientError;
use crate::request::GenerationRequest;
use crate::result::{TaskResult, TaskSubmission};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use std::time::Duration;
use ureq::Agent;

pub const RUNPOD_GRAPHQL_URL: &str = "https://api.runpod.io/graphql";
pub const DEFAULT_IMAGE: &str = "acestep/acestep:latest";
pub const SERVER_PORT: u16 = 8001;
const POD_POLL_INTERVAL: Duration = Duration::from_secs(5);
const SERVER_POLL_INTERVAL: Duration = Duration::from_secs(3);

/// GPU types offered in the wizard.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GpuOption {
    pub label: &'static str,
    pub gpu_type_id: &'static str,
    pub price_per_hour: f64,
}

pub const GPU_OPTIONS: [GpuOption; 3] = [
    GpuOption {
        label: "RTX 4090",
        gpu_type_id: "NVIDIA GeForce RTX 4090",
        price_per_hour: 0.69,
    },
    GpuOption {
        label: "A100 80GB",
        gpu_type_id: "NVIDIA A100 80GB PCIe",
        price_per_hour: 1.64,
    },
    GpuOption {
        label: "H100",
        gpu_type_id: "NVIDIA H100 80GB HBM3",
        price_per_hour: 3.89,
    },
];

/// Pod creation input in the provider's camelCase schema.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PodSpec {
    pub name: String,
    pub image_name: String,
    pub gpu_type_id: String,
    pub gpu_count: u32,
    pub cloud_type: String,
    pub ports: String,
    pub container_disk_in_gb: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub template_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub network_volume_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub volume_in_gb: Option<u32>,
}

impl PodSpec {
    /// Empty template/volume ids are left unset.
    pub fn new(gpu_type_id: &str, image_name: &str, template_id: &str, volume_id: &str) -> Self {
        let non_empty = |value: &str| (!value.is_empty()).then(|| value.to_string());
        let network_volume_id = non_empty(volume_id);
        Self {
            name: "acestep-musicgen".to_string(),
            image_name: image_name.to_string(),
            gpu_type_id: gpu_type_id.to_string(),
            gpu_count: 1,
            cloud_type: "SECURE".to_string(),
            ports: format!("{SERVER_PORT}/http"),
            container_disk_in_gb: 20,
            template_id: non_empty(template_id),
            volume_in_gb: network_volume_id.as_ref().map(|_| 50),
            network_volume_id,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PodRuntime {
    #[serde(default)]
    pub uptime_in_seconds: u64,
}

/// Provider view of a pod.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PodState {
    #[serde(default)]
    pub desired_status: String,
    #[serde(default)]
    pub runtime: Option<PodRuntime>,
}

impl PodState {
    /// Running and has reported a positive uptime.
    pub fn is_ready(&self) -> bool {
        self.desired_status == "RUNNING"
            && self
                .runtime
                .as_ref()
                .is_some_and(|runtime| runtime.uptime_in_seconds > 0)
    }
}

/// Cloud provisioning surface.
pub trait PodProvider {
    fn create(&self, spec: &PodSpec) -> Result<String, ClientError>;
    fn get(&self, pod_id: &str) -> Result<PodState, ClientError>;
    fn terminate(&self, pod_id: &str) -> Result<(), ClientError>;
}

/// Proxy URL RunPod assigns to the pod's HTTP port.
pub fn pod_base_url(pod_id: &str) -> String {
    format!("https://{pod_id}-{SERVER_PORT}.proxy.runpod.net")
}

/// RunPod GraphQL API.
#[derive(Debug, Clone)]
pub struct RunPodProvider {
    agent: Agent,
    api_key: String,
    endpoint: String,
}

impl RunPodProvider {
    pub fn new(api_key: &str) -> Self {
        Self::with_endpoint(api_key, RUNPOD_GRAPHQL_URL)
    }

    pub fn with_endpoint(api_key: &str, endpoint: &str) -> Self {
        Self {
            agent: build_agent(),
            api_key: api_key.to_string(),
            endpoint: endpoint.to_string(),
        }
    }

    fn graphql(&self, query: &str, variables: Value) -> Result<Value, ClientError> {
        let mut response = self
            .agent
            .post(&self.endpoint)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .send_json(json!({ "query": query, "variables": variables }))
            .map_err(|err| ClientError::transport("runpod graphql", err))?;
        let body: Value = response
            .body_mut()
            .read_json()
            .map_err(|err| ClientError::Provider(format!("decode response: {err}")))?;
        if let Some(errors) = body.get("errors").and_then(Value::as_array) {
            if !errors.is_empty() {
                let messages: Vec<String> = errors
                    .iter()
                    .map(|error| {
                        error
                            .get("message")
                            .and_then(Value::as_str)
                            .map(str::to_string)
                            .unwrap_or_else(|| error.to_string())
                    })
                    .collect();
                return Err(ClientError::Provider(messages.join("; ")));
            }
        }
        Ok(body.get("data").cloned().unwrap_or(Value::Null))
    }
}

impl PodProvider for RunPodProvider {
    fn create(&self, spec: &PodSpec) -> Result<String, ClientError> {
        let data = self.graphql(
            "mutation CreatePod($input: PodFindAndDeployOnDemandInput) { \
             podFindAndDeployOnDemand(input: $input) { id desiredStatus } }",
            json!({ "input": spec }),
        )?;
        data.pointer("/podFindAndDeployOnDemand/id")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| ClientError::Provider("pod creation returned no id".to_string()))
    }

    fn get(&self, pod_id: &str) -> Result<PodState, ClientError> {
        let data = self.graphql(
            "query Pod($input: PodFilter) { \
             pod(input: $input) { id desiredStatus runtime { uptimeInSeconds } } }",
            json!({ "input": { "podId": pod_id } }),
        )?;
        match data.get("pod") {
            Some(pod) if !pod.is_null() => serde_json::from_value(pod.clone())
                .map_err(|err| ClientError::Provider(format!("decode pod state: {err}"))),
            _ => Ok(PodState::default()),
        }
    }

    fn terminate(&self, pod_id: &str) -> Result<(), ClientError> {
        self.graphql(
            "mutation TerminatePod($input: PodTerminateInput!) { podTerminate(input: $input) }",
            json!({ "input": { "podId": pod_id } }),
        )?;
        Ok(())
    }
}

/// Provisions a pod and talks to the ACE-Step server running on it.
pub struct PodClient<P: PodProvider = RunPodProvider> {
    provider: P,
    spec: PodSpec,
    agent: Agent,
    server_api_key: String,
    pod_id: Option<String>,
    api: Option<AceStepApi>,
}

impl<P: PodProvider> PodClient<P> {
    pub fn new(provider: P, spec: PodSpec) -> Self {
        Self {
            provider,
            spec,
            agent: build_agent(),
            server_api_key: String::new(),
            pod_id: None,
            api: None,
        }
    }

    /// Bearer token for the ACE-Step server inside the pod.
    pub fn with_server_api_key(mut self, api_key: &str) -> Self {
        self.server_api_key = api_key.to_string();
        self
    }

    pub fn pod_id(&self) -> Option<&str> {
        self.pod_id.as_deref()
    }

    pub fn create_pod(&mut self) -> Result<String, ClientError> {
        let pod_id = self.provider.create(&self.spec)?;
        tracing::info!(pod_id = %pod_id, gpu = %self.spec.gpu_type_id, "pod created");
        self.pod_id = Some(pod_id.clone());
        Ok(pod_id)
    }

    /// Poll the provider until the pod runs, then resolve its URL.
    pub fn wait_for_pod(
        &mut self,
        timeout: Duration,
        clock: &dyn Clock,
    ) -> Result<String, ClientError> {
        let pod_id = self
            .pod_id
            .clone()
            .ok_or_else(|| ClientError::Precondition("no pod created".to_string()))?;
        let start = clock.now();
        while clock.now().duration_since(start) < timeout {
            let state = self.provider.get(&pod_id)?;
            if state.is_ready() {
                let base_url = pod_base_url(&pod_id);
                tracing::info!(pod_id = %pod_id, base_url = %base_url, "pod running");
                self.api = Some(AceStepApi::new(
                    self.agent.clone(),
                    &base_url,
                    &self.server_api_key,
                ));
                return Ok(base_url);
            }
            tracing::debug!(pod_id = %pod_id, status = %state.desired_status, "pod not ready");
            clock.sleep(POD_POLL_INTERVAL);
        }
        Err(ClientError::timeout(
            format!("pod {pod_id}"),
            clock.now().duration_since(start),
            timeout,
        ))
    }

    /// Poll `/health` until the server answers. Does not fail.
    pub fn wait_for_server(&self, timeout: Duration, clock: &dyn Clock) -> bool {
        let start = clock.now();
        while clock.now().duration_since(start) < timeout {
            if self.health_check() {
                return true;
            }
            clock.sleep(SERVER_POLL_INTERVAL);
        }
        false
    }

    /// Terminate the pod. No-op when nothing was provisioned.
    pub fn destroy_pod(&mut self) -> Result<(), ClientError> {
        let Some(pod_id) = self.pod_id.clone() else {
            return Ok(());
        };
        self.provider.terminate(&pod_id)?;
        tracing::info!(pod_id = %pod_id, "pod terminated");
        self.pod_id = None;
        self.api = None;
        Ok(())
    }

    fn api(&self) -> Result<&AceStepApi, ClientError> {
        self.api
            .as_ref()
            .ok_or_else(|| ClientError::Precondition("pod is not running yet".to_string()))
    }
}

impl<P: PodProvider> MusicGenClient for PodClient<P> {
    fn health_check(&self) -> bool {
        self.api.as_ref().is_some_and(AceStepApi::health_check)
    }

    fn submit_task(&self, request: &GenerationRequest) -> Result<TaskSubmission, ClientError> {
        self.api()?.submit_task(request)
    }

    fn poll_result(&self, task_id: &str) -> Result<TaskResult, ClientError> {
        self.api()?.poll_result(task_id)
    }

    fn download_audio(
        &self,
        remote_path: &str,
        local_path: &Path,
    ) -> Result<PathBuf, ClientError> {
        self.api()?.download_audio(remote_path, local_path)
    }

    fn base_url(&self) -> Option<&str> {
        self.api.as_ref().map(AceStepApi::base_url)
    }
}

#[cfg(test)]
#[path = "pod_tests.rs"]
mod tests;
