use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A unit of work handed to one worker in the axel pool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskInstruction {
    pub task_id: Uuid,
    pub task_type: TaskType,
    pub specification: String,
    #[serde(default)]
    pub context: HashMap<String, serde_json::Value>,
    #[serde(default)]
    pub dependencies: HashSet<Uuid>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    CodeImplementation,
    Documentation,
    Testing,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskResult {
    pub task_id: Uuid,
    pub task_type: TaskType,
    pub status: TaskStatus,
    pub summary: String,
    pub details: String,
    #[serde(default)]
    pub artifacts: HashMap<String, String>,
    #[serde(default)]
    pub error_message: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Completed,
    Failed,
    Partial,
}

impl TaskResult {
    /// Build a failure result that still carries the task's original
    /// instruction in `details`, so a failure summary can enumerate what
    /// each failed task was actually supposed to do.
    pub fn failed(task_id: Uuid, task_type: TaskType, specification: impl Into<String>, error_message: impl Into<String>) -> Self {
        Self {
            task_id,
            task_type,
            status: TaskStatus::Failed,
            summary: "task failed".into(),
            details: specification.into(),
            artifacts: HashMap::new(),
            error_message: Some(error_message.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failed_result_carries_error_message_and_original_specification() {
        let id = Uuid::new_v4();
        let result = TaskResult::failed(id, TaskType::Testing, "write tests for the parser", "timed out");
        assert_eq!(result.status, TaskStatus::Failed);
        assert_eq!(result.error_message.as_deref(), Some("timed out"));
        assert_eq!(result.details, "write tests for the parser");
    }

    #[test]
    fn task_type_serializes_snake_case() {
        let json = serde_json::to_string(&TaskType::CodeImplementation).unwrap();
        assert_eq!(json, "\"code_implementation\"");
    }
}
