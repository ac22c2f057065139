//! Closed registry of deferred-task call handlers.
//!
//! A deferred task's call list names `(target_type, operation)` pairs; this
//! registry maps each pair to a typed handler instead of resolving methods
//! by name at runtime. Unregistered pairs are rejected, ideally at enqueue
//! time.

use std::{collections::HashMap, sync::Arc};

use crate::{Error, Result, types::DeferredTask, types::TaskCall};

/// Handler for one `(target_type, operation)` pair.
///
/// Receives the target identifier and the call arguments. `Ok(false)` counts
/// as a sub-call error without aborting the task; `Err` aborts the remaining
/// entries.
pub type CallHandler =
    Arc<dyn Fn(&str, &serde_json::Value) -> Result<bool> + Send + Sync>;

/// Maps `(target_type, operation)` to handlers.
#[derive(Default, Clone)]
pub struct CallRegistry {
    handlers: HashMap<(String, String), CallHandler>,
}

impl CallRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    pub fn register<F>(
        &mut self,
        target_type: impl Into<String>,
        operation: impl Into<String>,
        handler: F,
    ) where
        F: Fn(&str, &serde_json::Value) -> Result<bool> + Send + Sync + 'static,
    {
        self.handlers
            .insert((target_type.into(), operation.into()), Arc::new(handler));
    }

    /// Look up the handler for a call entry.
    pub fn resolve(&self, call: &TaskCall) -> Result<&CallHandler> {
        self.handlers
            .get(&(call.target_type.clone(), call.operation.clone()))
            .ok_or_else(|| Error::unknown_operation(&call.target_type, &call.operation))
    }

    /// Invoke the handler for a call entry.
    pub fn invoke(&self, call: &TaskCall) -> Result<bool> {
        let handler = self.resolve(call)?;
        handler(&call.target_id, &call.arguments)
    }

    /// Check every entry of a task against the registry. Used at enqueue
    /// time so an unknown operation is reported before the task persists.
    pub fn validate(&self, task: &DeferredTask) -> Result<()> {
        for call in &task.calls {
            self.resolve(call)?;
        }
        Ok(())
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {super::*, chrono::Utc};

    fn call(target_type: &str, operation: &str) -> TaskCall {
        TaskCall {
            target_type: target_type.into(),
            target_id: "1".into(),
            operation: operation.into(),
            arguments: serde_json::json!([]),
        }
    }

    #[test]
    fn test_invoke_registered_handler() {
        let mut reg = CallRegistry::new();
        reg.register("member", "notify", |_id, _args| Ok(true));
        assert!(reg.invoke(&call("member", "notify")).unwrap());
    }

    #[test]
    fn test_unknown_operation() {
        let reg = CallRegistry::new();
        let err = reg.invoke(&call("member", "notify")).unwrap_err();
        assert!(matches!(err, Error::UnknownOperation { .. }));
    }

    #[test]
    fn test_handler_false_is_not_an_error() {
        let mut reg = CallRegistry::new();
        reg.register("member", "notify", |_id, _args| Ok(false));
        assert!(!reg.invoke(&call("member", "notify")).unwrap());
    }

    #[test]
    fn test_validate_task() {
        let mut reg = CallRegistry::new();
        reg.register("member", "notify", |_id, _args| Ok(true));

        let mut task = DeferredTask::new(Utc::now());
        task.add_to_task("member", "1", "notify", serde_json::json!([]));
        assert!(reg.validate(&task).is_ok());

        task.add_to_task("order", "2", "cancel", serde_json::json!([]));
        assert!(reg.validate(&task).is_err());
    }
}
