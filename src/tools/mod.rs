//! Tool calls requested by the assistant
//!
//! The assistant names functions; we map each name onto the internal
//! [`EventKind`] that performs it, run it, and hand the outputs back as one
//! batch addressed by run and thread.

pub mod zapier;

use serde::Serialize;

pub use zapier::{Notifier, ZapierWebhook};

use crate::assistant::RequiredAction;
use crate::events::EventKind;
use crate::{Error, Result};

/// Function names the assistant may call, in lookup order
pub const SUPPORTED_FUNCTIONS: &[(&str, EventKind)] = &[
    ("send_text_message", EventKind::Zapier),
    ("send_image_description", EventKind::GetSnapshot),
];

/// One function invocation requested by the assistant
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolCall {
    /// Internal event that performs the call
    pub kind: EventKind,
    /// Raw JSON arguments as sent by the assistant
    pub arguments: String,
    /// Backend identifier the output must be tagged with
    pub call_id: String,
    /// Filled in once the call has run
    pub output: Option<String>,
}

/// All tool calls of one paused run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolCallBatch {
    /// Calls in the order the backend returned them
    pub calls: Vec<ToolCall>,
    /// Run waiting for the outputs
    pub run_id: String,
    /// Thread the run belongs to
    pub thread_id: String,
}

/// Output of one tool call as submitted to the backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ToolOutput {
    /// Identifier of the call this answers
    pub tool_call_id: String,
    /// Text the assistant sees as the tool's answer
    pub output: String,
}

/// Map an assistant function name to the event that performs it
///
/// # Errors
///
/// Returns [`Error::UnsupportedTool`] for names outside [`SUPPORTED_FUNCTIONS`]
pub fn event_kind_for(function: &str) -> Result<EventKind> {
    SUPPORTED_FUNCTIONS
        .iter()
        .find(|(name, _)| *name == function)
        .map(|(_, kind)| *kind)
        .ok_or_else(|| Error::UnsupportedTool(function.to_string()))
}

/// Translate a paused run into an internal tool-call batch
///
/// All-or-nothing: one unknown function fails the whole batch, since a
/// partially resolved batch cannot be resubmitted.
///
/// # Errors
///
/// Returns [`Error::UnsupportedTool`] if any requested function is unknown
pub fn resolve_action(action: &RequiredAction) -> Result<ToolCallBatch> {
    let calls = action
        .tool_calls
        .iter()
        .map(|call| {
            Ok(ToolCall {
                kind: event_kind_for(&call.name)?,
                arguments: call.arguments.clone(),
                call_id: call.id.clone(),
                output: None,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    tracing::debug!(
        run_id = %action.run_id,
        calls = calls.len(),
        "resolved required tool calls"
    );

    Ok(ToolCallBatch {
        calls,
        run_id: action.run_id.clone(),
        thread_id: action.thread_id.clone(),
    })
}

impl ToolCallBatch {
    /// Outputs to submit, one per call, in call order
    ///
    /// Calls that never produced output are answered with an empty string.
    #[must_use]
    pub fn outputs(&self) -> Vec<ToolOutput> {
        self.calls
            .iter()
            .map(|call| ToolOutput {
                tool_call_id: call.call_id.clone(),
                output: call.output.clone().unwrap_or_default(),
            })
            .collect()
    }
}

/// Pick the prompt for a snapshot tool call out of its JSON arguments
///
/// Falls back to plain text arguments, then to a generic prompt.
#[must_use]
pub fn snapshot_prompt(arguments: &str) -> String {
    const DEFAULT_PROMPT: &str = "Describe the image.";

    let Ok(value) = serde_json::from_str::<serde_json::Value>(arguments) else {
        let trimmed = arguments.trim();
        return if trimmed.is_empty() {
            DEFAULT_PROMPT.to_string()
        } else {
            trimmed.to_string()
        };
    };

    ["prompt", "text", "description", "message"]
        .iter()
        .filter_map(|field| value.get(field).and_then(serde_json::Value::as_str))
        .find(|s| !s.trim().is_empty())
        .map_or_else(|| DEFAULT_PROMPT.to_string(), ToString::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assistant::RequiredToolCall;

    fn action(names: &[&str]) -> RequiredAction {
        RequiredAction {
            run_id: "run_1".to_string(),
            thread_id: "thread_1".to_string(),
            tool_calls: names
                .iter()
                .enumerate()
                .map(|(i, name)| RequiredToolCall {
                    id: format!("call_{i}"),
                    name: (*name).to_string(),
                    arguments: format!(r#"{{"n":{i}}}"#),
                })
                .collect(),
        }
    }

    #[test]
    fn maps_known_functions() {
        assert_eq!(event_kind_for("send_text_message").unwrap(), EventKind::Zapier);
        assert_eq!(
            event_kind_for("send_image_description").unwrap(),
            EventKind::GetSnapshot
        );
    }

    #[test]
    fn unknown_function_is_unsupported() {
        let err = event_kind_for("unknown_fn").unwrap_err();
        assert!(matches!(err, Error::UnsupportedTool(name) if name == "unknown_fn"));
    }

    #[test]
    fn resolve_preserves_order_and_ids() {
        let batch = resolve_action(&action(&[
            "send_image_description",
            "send_text_message",
            "send_text_message",
        ]))
        .unwrap();

        assert_eq!(batch.run_id, "run_1");
        assert_eq!(batch.thread_id, "thread_1");
        let ids: Vec<_> = batch.calls.iter().map(|c| c.call_id.as_str()).collect();
        assert_eq!(ids, ["call_0", "call_1", "call_2"]);
        assert_eq!(batch.calls[0].kind, EventKind::GetSnapshot);
        assert_eq!(batch.calls[2].arguments, r#"{"n":2}"#);
        assert!(batch.calls.iter().all(|c| c.output.is_none()));
    }

    #[test]
    fn one_unknown_function_fails_whole_batch() {
        let err = resolve_action(&action(&["send_text_message", "unknown_fn"])).unwrap_err();
        assert!(matches!(err, Error::UnsupportedTool(_)));
    }

    #[test]
    fn outputs_follow_call_order() {
        let mut batch = resolve_action(&action(&["send_text_message", "send_text_message"])).unwrap();
        batch.calls[0].output = Some("Success!".to_string());
        batch.calls[1].output = Some("Error: webhook down".to_string());

        let outputs = batch.outputs();
        assert_eq!(outputs.len(), 2);
        assert_eq!(outputs[0].tool_call_id, "call_0");
        assert_eq!(outputs[1].output, "Error: webhook down");
    }

    #[test]
    fn snapshot_prompt_extraction() {
        assert_eq!(snapshot_prompt(r#"{"prompt":"what is this?"}"#), "what is this?");
        assert_eq!(snapshot_prompt(r#"{"description":"read the label"}"#), "read the label");
        assert_eq!(snapshot_prompt("{}"), "Describe the image.");
        assert_eq!(snapshot_prompt("  "), "Describe the image.");
        assert_eq!(snapshot_prompt("look at the desk"), "look at the desk");
    }
}
