//! Task submission and result models.
//!
//! The `/query_result` item carries its audio list in a `result` field that is
//! usually JSON text inside the JSON response. Normalization decodes it in a
//! second pass and degrades to an empty list on anything unexpected; it never
//! fails.
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use std::collections::BTreeMap;

/// Response body of `POST /release_task`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskSubmission {
    pub task_id: String,
    #[serde(default = "default_submission_status")]
    pub status: String,
    #[serde(default)]
    pub queue_position: u64,
}

fn default_submission_status() -> String {
    "queued".to_string()
}

/// Server-side task state: 0 running, 1 succeeded, 2 failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TaskStatus {
    #[default]
    Running,
    Succeeded,
    Failed,
}

impl TaskStatus {
    pub fn code(&self) -> u8 {
        match self {
            TaskStatus::Running => 0,
            TaskStatus::Succeeded => 1,
            TaskStatus::Failed => 2,
        }
    }

    /// Codes outside the known set are terminal failures.
    pub fn from_code(code: i64) -> Self {
        match code {
            0 => TaskStatus::Running,
            1 => TaskStatus::Succeeded,
            _ => TaskStatus::Failed,
        }
    }

    /// Integer codes, integral floats (`1.0`) and numeric strings (`"1"`) are
    /// all accepted; anything else is treated as absent.
    fn from_value(value: Option<&Value>) -> Option<Self> {
        value.and_then(status_code).map(Self::from_code)
    }
}

fn status_code(value: &Value) -> Option<i64> {
    value
        .as_i64()
        .or_else(|| {
            value
                .as_f64()
                .filter(|code| code.fract() == 0.0)
                .map(|code| code as i64)
        })
        .or_else(|| value.as_str()?.trim().parse().ok())
}

impl Serialize for TaskStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.code())
    }
}

impl<'de> Deserialize<'de> for TaskStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let code = i64::deserialize(deserializer)?;
        Ok(Self::from_code(code))
    }
}

/// Loosely typed value in the auxiliary `metas` mapping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetaValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    /// Nested arrays/objects are kept verbatim.
    Other(Value),
}

impl MetaValue {
    pub fn from_json(value: &Value) -> Self {
        match value {
            Value::Null => MetaValue::Null,
            Value::Bool(flag) => MetaValue::Bool(*flag),
            Value::Number(number) => match number.as_i64() {
                Some(int) => MetaValue::Int(int),
                None => number
                    .as_f64()
                    .map(MetaValue::Float)
                    .unwrap_or_else(|| MetaValue::Other(value.clone())),
            },
            Value::String(text) => MetaValue::Text(text.clone()),
            other => MetaValue::Other(other.clone()),
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            MetaValue::Int(int) => Some(*int as f64),
            MetaValue::Float(float) => Some(*float),
            _ => None,
        }
    }
}

pub type Metas = BTreeMap<String, MetaValue>;

/// One generated audio file reported by the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioResult {
    pub file: String,
    pub status: TaskStatus,
    #[serde(default)]
    pub prompt: String,
    #[serde(default)]
    pub lyrics: String,
    #[serde(default)]
    pub metas: Metas,
}

/// Normalized snapshot of one poll response.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TaskResult {
    pub task_id: String,
    pub status: TaskStatus,
    pub progress_text: String,
    pub audios: Vec<AudioResult>,
    pub error: Option<String>,
}

impl TaskResult {
    pub fn is_running(&self) -> bool {
        self.status == TaskStatus::Running
    }

    pub fn is_succeeded(&self) -> bool {
        self.status == TaskStatus::Succeeded
    }

    pub fn is_failed(&self) -> bool {
        self.status == TaskStatus::Failed
    }

    /// Normalize one `/query_result` item. Total over every input.
    pub fn from_api_item(item: &Value) -> Self {
        let task_id = item
            .get("task_id")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let status = TaskStatus::from_value(item.get("status")).unwrap_or_default();
        let progress_text = item
            .get("progress_text")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        let mut audios = Vec::new();
        let mut error = None;
        for entry in decode_result_entries(item.get("result")) {
            let Some(fields) = entry.as_object() else {
                continue;
            };
            // Last entry carrying an error wins.
            if let Some(message) = error_text(fields.get("error")) {
                error = Some(message);
            }
            audios.push(AudioResult {
                file: text_field(fields.get("file")),
                status: TaskStatus::from_value(fields.get("status")).unwrap_or(status),
                prompt: text_field(fields.get("prompt")),
                lyrics: text_field(fields.get("lyrics")),
                metas: fields
                    .get("metas")
                    .and_then(Value::as_object)
                    .map(|metas| {
                        metas
                            .iter()
                            .map(|(key, value)| (key.clone(), MetaValue::from_json(value)))
                            .collect()
                    })
                    .unwrap_or_default(),
            });
        }

        Self {
            task_id,
            status,
            progress_text,
            audios,
            error,
        }
    }
}

/// Second decode pass for the `result` field.
fn decode_result_entries(raw: Option<&Value>) -> Vec<Value> {
    match raw {
        Some(Value::String(text)) => match serde_json::from_str::<Value>(text) {
            Ok(Value::Array(entries)) => entries,
            Ok(_) | Err(_) => Vec::new(),
        },
        Some(Value::Array(entries)) => entries.clone(),
        _ => Vec::new(),
    }
}

fn text_field(value: Option<&Value>) -> String {
    value
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

fn error_text(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::Null | Value::Bool(false) => None,
        Value::String(text) if text.is_empty() => None,
        Value::String(text) => Some(text.clone()),
        other => Some(other.to_string()),
    }
}

#[cfg(test)]
#[path = "result_tests.rs"]
mod tests;
