//! Bounded polling of a submitted task.
//!
//! The loop has two states: polling and done. A non-running snapshot ends the
//! loop immediately; otherwise it reports progress and sleeps a fixed interval.
//! The deadline is checked once per iteration against the time the loop started.
use crate::client::MusicGenClient;
use crate::clock::Clock;
use crate::display::Console;
use crate::error::ClientError;
use crate::result::TaskResult;
use std::time::Duration;

pub const POLL_INTERVAL: Duration = Duration::from_secs(2);
pub const DEFAULT_PROGRESS_TEXT: &str = "Generating...";

/// Poll `task_id` until it succeeds or fails, or `timeout` passes.
///
/// Poll errors are returned as-is; they are not retried.
pub fn poll_until_done(
    client: &dyn MusicGenClient,
    task_id: &str,
    timeout: Duration,
    clock: &dyn Clock,
    console: &mut dyn Console,
) -> Result<TaskResult, ClientError> {
    let start = clock.now();
    let outcome = loop {
        let elapsed = clock.now().duration_since(start);
        if elapsed > timeout {
            tracing::warn!(task_id, elapsed_secs = elapsed.as_secs(), "generation timed out");
            break Err(ClientError::timeout(
                format!("task {task_id}"),
                elapsed,
                timeout,
            ));
        }

        let result = match client.poll_result(task_id) {
            Ok(result) => result,
            Err(err) => break Err(err),
        };
        if !result.is_running() {
            tracing::info!(
                task_id,
                succeeded = result.is_succeeded(),
                elapsed_secs = elapsed.as_secs(),
                "task finished"
            );
            break Ok(result);
        }

        let text = if result.progress_text.is_empty() {
            DEFAULT_PROGRESS_TEXT
        } else {
            result.progress_text.as_str()
        };
        console.progress(text, elapsed);
        clock.sleep(POLL_INTERVAL);
    };
    console.end_progress();
    outcome
}

#[cfg(test)]
#[path = "poll_tests.rs"]
mod tests;
