//! Worker pool (§4.G, "axel"): decompose a specification into up to
//! `max_workers` tasks, run them concurrently against per-task deadlines,
//! and aggregate the results into one Markdown summary.
//!
//! Grounded on the decompose → parallel-execute → aggregate shape of
//! `original_source/radbot/agent/specialized/axel.py`; there is exactly one
//! implementation of this shape (no separate execution-agent wrapper).

use std::collections::HashMap;
use std::sync::Arc;

use beto_domain::event::{Event, EventKind};
use beto_domain::task::{TaskInstruction, TaskResult, TaskStatus, TaskType};
use beto_domain::tool::Message;
use beto_providers::ChatRequest;
use uuid::Uuid;

use crate::runtime::cancel::CancelToken;
use crate::state::AppState;

const AXEL_AGENT: &str = "axel";

/// Decompose `specification` into up to `max_workers` tasks. Task types are
/// considered in priority order (code implementation, then testing, then
/// documentation); lower-priority types are dropped first when
/// `max_workers` is smaller than the full set.
fn decompose(specification: &str, max_workers: usize) -> Vec<TaskInstruction> {
    let priority = [TaskType::CodeImplementation, TaskType::Testing, TaskType::Documentation];
    priority
        .into_iter()
        .take(max_workers.max(1))
        .map(|task_type| TaskInstruction {
            task_id: Uuid::new_v4(),
            task_type,
            specification: specification.to_string(),
            context: HashMap::new(),
            dependencies: Default::default(),
        })
        .collect()
}

fn task_prompt(task: &TaskInstruction) -> String {
    let kind = match task.task_type {
        TaskType::CodeImplementation => "Implement the code changes required by the following specification.",
        TaskType::Testing => "Write tests covering the following specification.",
        TaskType::Documentation => "Write documentation for the following specification.",
    };
    format!("{kind}\n\n{}", task.specification)
}

async fn execute_task(state: &AppState, task: &TaskInstruction) -> Result<String, beto_domain::error::Error> {
    let agent = state
        .agents
        .get(AXEL_AGENT)
        .ok_or_else(|| beto_domain::error::Error::Config("axel agent is not registered".into()))?;

    let (provider, model) = crate::runtime::provider_select::resolve_provider(state, agent.model_id.as_deref())?;

    let req = ChatRequest {
        messages: vec![Message::system(agent.instruction.as_str()), Message::user(task_prompt(task))],
        tools: Vec::new(),
        temperature: None,
        max_tokens: None,
        json_mode: false,
        model: Some(model),
    };

    let resp = provider.chat(req).await?;
    Ok(resp.content)
}

/// Polls `cancel` until it trips. Used alongside the per-task timeout so a
/// cancelled parent session can stop in-flight workers without waiting out
/// the full deadline.
async fn wait_for_cancel(cancel: &CancelToken) {
    loop {
        if cancel.is_cancelled() {
            return;
        }
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
    }
}

async fn run_worker(state: Arc<AppState>, task: TaskInstruction, timeout_ms: u64, cancel: CancelToken) -> TaskResult {
    let deadline = std::time::Duration::from_millis(timeout_ms);
    tokio::select! {
        result = tokio::time::timeout(deadline, execute_task(&state, &task)) => match result {
            Ok(Ok(summary)) => TaskResult {
                task_id: task.task_id,
                task_type: task.task_type,
                status: TaskStatus::Completed,
                summary: summary.lines().next().unwrap_or("completed").chars().take(120).collect(),
                details: summary,
                artifacts: HashMap::new(),
                error_message: None,
            },
            Ok(Err(e)) => TaskResult::failed(task.task_id, task.task_type, task.specification.clone(), e.to_string()),
            Err(_) => TaskResult::failed(task.task_id, task.task_type, task.specification.clone(), "execution timeout"),
        },
        _ = wait_for_cancel(&cancel) => {
            TaskResult::failed(task.task_id, task.task_type, task.specification.clone(), "cancelled")
        }
    }
}

fn render_markdown(results: &[TaskResult]) -> String {
    let mut by_type: HashMap<TaskType, Vec<&TaskResult>> = HashMap::new();
    for r in results {
        by_type.entry(r.task_type).or_default().push(r);
    }

    let mut out = String::from("# Worker pool summary\n\n");
    for task_type in [TaskType::CodeImplementation, TaskType::Testing, TaskType::Documentation] {
        let Some(group) = by_type.get(&task_type) else { continue };
        out.push_str(&format!("## {task_type:?}\n\n"));
        for r in group {
            out.push_str(&format!("- [{:?}] {}\n", r.status, r.summary));
        }
        out.push('\n');
    }

    let failures: Vec<&TaskResult> = results.iter().filter(|r| r.status == TaskStatus::Failed).collect();
    if !failures.is_empty() {
        out.push_str("## Failures\n\n");
        for f in failures {
            out.push_str(&format!(
                "- {:?}: {}\n  instruction: {}\n",
                f.task_type,
                f.error_message.as_deref().unwrap_or("unknown error"),
                f.details,
            ));
        }
    }

    out
}

/// Run a full decompose → parallel-execute → aggregate cycle for
/// `specification`, pushing "Progress: k/N" events to `parent_session_id`
/// as each worker resolves, and writing each result into
/// `Session.state["result:<task_id>"]`.
///
/// Each worker registers its own cancel token in the parent session's
/// cancel group, so cancelling the parent session (`DELETE
/// /sessions/{id}/cancel`) cascades to every in-flight axel worker instead
/// of only stopping the coordinator turn that kicked the run off.
pub async fn run(state: Arc<AppState>, parent_session_id: Uuid, specification: String) -> String {
    let cfg = state.config.tasks.clamped();
    let tasks = decompose(&specification, cfg.max_workers);
    let total = tasks.len();
    let parent_key = parent_session_id.to_string();

    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    let mut handles = Vec::with_capacity(tasks.len());
    for task in tasks {
        let state = state.clone();
        let tx = tx.clone();
        let timeout_ms = cfg.task_timeout_ms;
        let child_key = format!("{parent_key}:axel:{}", task.task_id);
        let cancel = state.cancel_tokens.register(&child_key);
        state.cancel_tokens.add_to_group(&parent_key, &child_key);
        let parent_key = parent_key.clone();
        handles.push(tokio::spawn(async move {
            let result = run_worker(state.clone(), task, timeout_ms, cancel).await;
            state.cancel_tokens.remove(&child_key);
            state.cancel_tokens.remove_from_group(&parent_key, &child_key);
            let _ = tx.send(result);
        }));
    }
    drop(tx);

    let mut results = Vec::with_capacity(total);
    let mut completed = 0usize;
    while let Some(result) = rx.recv().await {
        completed += 1;
        state.sessions.set_state(
            parent_session_id,
            &format!("result:{}", result.task_id),
            serde_json::to_value(&result).unwrap_or_default(),
        );

        let seq = state.sessions.get(parent_session_id).map(|s| s.next_seq()).unwrap_or(0);
        let event = Event::new(
            parent_session_id,
            seq,
            EventKind::System { message: format!("Progress: {completed}/{total} tasks completed") },
        );
        state.sessions.append_event(parent_session_id, event.clone());
        state.fanout.publish(parent_session_id, &event);

        results.push(result);
    }
    for h in handles {
        let _ = h.await;
    }

    render_markdown(&results)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decompose_caps_at_max_workers_by_priority() {
        let tasks = decompose("build a thing", 2);
        assert_eq!(tasks.len(), 2);
        assert_eq!(tasks[0].task_type, TaskType::CodeImplementation);
        assert_eq!(tasks[1].task_type, TaskType::Testing);
    }

    #[test]
    fn decompose_full_set_when_capacity_allows() {
        let tasks = decompose("build a thing", 5);
        assert_eq!(tasks.len(), 3);
    }

    #[test]
    fn render_markdown_includes_failure_section() {
        let results = vec![
            TaskResult {
                task_id: Uuid::new_v4(),
                task_type: TaskType::CodeImplementation,
                status: TaskStatus::Completed,
                summary: "done".into(),
                details: String::new(),
                artifacts: HashMap::new(),
                error_message: None,
            },
            TaskResult::failed(Uuid::new_v4(), TaskType::Testing, "write tests covering the login flow", "execution timeout"),
        ];
        let md = render_markdown(&results);
        assert!(md.contains("## Failures"));
        assert!(md.contains("execution timeout"));
        assert!(md.contains("write tests covering the login flow"));
    }

    #[tokio::test]
    async fn wait_for_cancel_resolves_once_token_is_tripped() {
        let cancel = CancelToken::new();
        let child = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
            child.cancel();
        });
        tokio::time::timeout(std::time::Duration::from_secs(1), wait_for_cancel(&cancel)).await.expect("cancel should resolve the wait");
    }
}
