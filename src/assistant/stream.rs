//! Typed assistant run-stream events
//!
//! A run stream is a finite, ordered sequence of [`StreamEvent`]s. Only the
//! handful of event names the engine reacts to are decoded; everything else
//! becomes [`StreamEvent::Other`].

use std::pin::Pin;

use futures::{Stream, StreamExt};
use serde::Deserialize;

use super::sse::{SseFrame, SseParser};
use crate::{Error, Result};

/// Boxed stream of run events
pub type RunStream = Pin<Box<dyn Stream<Item = Result<StreamEvent>> + Send>>;

/// A tool call the paused run waits on
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequiredToolCall {
    /// Backend call identifier
    pub id: String,
    /// Function name
    pub name: String,
    /// Raw JSON arguments
    pub arguments: String,
}

/// A run paused for tool outputs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequiredAction {
    /// Paused run
    pub run_id: String,
    /// Thread of the run
    pub thread_id: String,
    /// Calls in backend order
    pub tool_calls: Vec<RequiredToolCall>,
}

/// Event observed on a run stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// Text fragment of the assistant message; `None` carries no text
    MessageDelta(Option<String>),
    /// Run paused waiting for tool outputs
    RequiresAction(RequiredAction),
    /// Run finished successfully
    RunCompleted,
    /// Run failed
    RunFailed,
    /// Any other event name
    Other(String),
}

#[derive(Deserialize)]
struct MessageDeltaData {
    delta: DeltaBody,
}

#[derive(Deserialize)]
struct DeltaBody {
    #[serde(default)]
    content: Vec<DeltaContent>,
}

#[derive(Deserialize)]
struct DeltaContent {
    text: Option<DeltaText>,
}

#[derive(Deserialize)]
struct DeltaText {
    value: Option<String>,
}

#[derive(Deserialize)]
struct RunData {
    id: String,
    thread_id: String,
    required_action: Option<RequiredActionData>,
}

#[derive(Deserialize)]
struct RequiredActionData {
    #[serde(rename = "type")]
    action_type: String,
    submit_tool_outputs: Option<SubmitToolOutputsData>,
}

#[derive(Deserialize)]
struct SubmitToolOutputsData {
    tool_calls: Vec<ToolCallData>,
}

#[derive(Deserialize)]
struct ToolCallData {
    id: String,
    function: FunctionData,
}

#[derive(Deserialize)]
struct FunctionData {
    name: String,
    #[serde(default)]
    arguments: String,
}

#[derive(Deserialize)]
struct ErrorData {
    message: Option<String>,
}

impl StreamEvent {
    /// Decode one SSE frame
    ///
    /// Returns `Ok(None)` for the terminal `done` frame.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Transport`] for `error` frames and
    /// [`Error::Assistant`] for payloads that do not match the event name
    pub fn from_frame(frame: &SseFrame) -> Result<Option<Self>> {
        let name = frame.event.as_deref().unwrap_or("message");

        let event = match name {
            "done" => return Ok(None),
            "error" => {
                let message = serde_json::from_str::<ErrorData>(&frame.data)
                    .ok()
                    .and_then(|e| e.message)
                    .unwrap_or_else(|| frame.data.clone());
                return Err(Error::Transport(format!("stream error: {message}")));
            }
            "thread.message.delta" => {
                let data: MessageDeltaData = parse(name, &frame.data)?;
                let text: Option<String> = data
                    .delta
                    .content
                    .into_iter()
                    .filter_map(|c| c.text.and_then(|t| t.value))
                    .reduce(|mut acc, part| {
                        acc.push_str(&part);
                        acc
                    });
                Self::MessageDelta(text)
            }
            "thread.run.requires_action" => {
                let run: RunData = parse(name, &frame.data)?;
                Self::RequiresAction(required_action(run)?)
            }
            "thread.run.completed" => Self::RunCompleted,
            "thread.run.failed" => Self::RunFailed,
            other => Self::Other(other.to_string()),
        };

        Ok(Some(event))
    }
}

fn parse<T: serde::de::DeserializeOwned>(name: &str, data: &str) -> Result<T> {
    serde_json::from_str(data)
        .map_err(|e| Error::Assistant(format!("malformed {name} payload: {e}")))
}

fn required_action(run: RunData) -> Result<RequiredAction> {
    let action = run
        .required_action
        .ok_or_else(|| Error::Assistant("requires_action event without required_action".to_string()))?;

    if action.action_type != "submit_tool_outputs" {
        return Err(Error::Assistant(format!(
            "unsupported required action: {}",
            action.action_type
        )));
    }

    let tool_calls = action
        .submit_tool_outputs
        .map(|s| s.tool_calls)
        .unwrap_or_default()
        .into_iter()
        .map(|call| RequiredToolCall {
            id: call.id,
            name: call.function.name,
            arguments: call.function.arguments,
        })
        .collect();

    Ok(RequiredAction {
        run_id: run.id,
        thread_id: run.thread_id,
        tool_calls,
    })
}

struct DecodeState<S> {
    bytes: Pin<Box<S>>,
    parser: SseParser,
    buffered: std::collections::VecDeque<Result<StreamEvent>>,
    finished: bool,
}

/// Decode an SSE byte stream into run events
///
/// Read errors surface as [`Error::Transport`]; the stream stops after the
/// first error or the `done` frame.
pub fn decode_run_stream<S, B, E>(bytes: S) -> RunStream
where
    S: Stream<Item = std::result::Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: std::fmt::Display + Send + 'static,
{
    let state = DecodeState {
        bytes: Box::pin(bytes),
        parser: SseParser::new(),
        buffered: std::collections::VecDeque::new(),
        finished: false,
    };

    Box::pin(futures::stream::unfold(state, |mut state| async move {
        loop {
            if let Some(item) = state.buffered.pop_front() {
                if item.is_err() {
                    state.finished = true;
                    state.buffered.clear();
                }
                return Some((item, state));
            }

            if state.finished {
                return None;
            }

            let frames = match state.bytes.next().await {
                Some(Ok(chunk)) => state.parser.push(chunk.as_ref()),
                Some(Err(e)) => {
                    state.finished = true;
                    return Some((Err(Error::Transport(format!("stream read failed: {e}"))), state));
                }
                None => {
                    state.finished = true;
                    state.parser.finish().into_iter().collect()
                }
            };

            for frame in frames {
                match StreamEvent::from_frame(&frame) {
                    Ok(Some(event)) => state.buffered.push_back(Ok(event)),
                    Ok(None) => {
                        state.finished = true;
                        break;
                    }
                    Err(e) => {
                        state.buffered.push_back(Err(e));
                        break;
                    }
                }
            }
        }
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(event: &str, data: &str) -> SseFrame {
        SseFrame {
            event: Some(event.to_string()),
            data: data.to_string(),
        }
    }

    #[test]
    fn decodes_text_delta() {
        let data = r#"{"id":"msg_1","object":"thread.message.delta","delta":{"content":[{"index":0,"type":"text","text":{"value":"Hello"}}]}}"#;
        let event = StreamEvent::from_frame(&frame("thread.message.delta", data)).unwrap();
        assert_eq!(event, Some(StreamEvent::MessageDelta(Some("Hello".to_string()))));
    }

    #[test]
    fn delta_without_text_is_none() {
        let data = r#"{"delta":{"content":[{"index":0,"type":"image_file"}]}}"#;
        let event = StreamEvent::from_frame(&frame("thread.message.delta", data)).unwrap();
        assert_eq!(event, Some(StreamEvent::MessageDelta(None)));
    }

    #[test]
    fn decodes_required_action() {
        let data = r#"{
            "id": "run_9",
            "thread_id": "thread_3",
            "status": "requires_action",
            "required_action": {
                "type": "submit_tool_outputs",
                "submit_tool_outputs": {
                    "tool_calls": [
                        {"id": "call_a", "type": "function", "function": {"name": "send_text_message", "arguments": "{\"message\":\"hi\"}"}}
                    ]
                }
            }
        }"#;
        let event = StreamEvent::from_frame(&frame("thread.run.requires_action", data))
            .unwrap()
            .unwrap();
        let StreamEvent::RequiresAction(action) = event else {
            panic!("expected requires action");
        };
        assert_eq!(action.run_id, "run_9");
        assert_eq!(action.thread_id, "thread_3");
        assert_eq!(action.tool_calls[0].name, "send_text_message");
        assert_eq!(action.tool_calls[0].arguments, r#"{"message":"hi"}"#);
    }

    #[test]
    fn terminal_and_unknown_events() {
        assert_eq!(
            StreamEvent::from_frame(&frame("thread.run.completed", "{}")).unwrap(),
            Some(StreamEvent::RunCompleted)
        );
        assert_eq!(
            StreamEvent::from_frame(&frame("thread.run.failed", "{}")).unwrap(),
            Some(StreamEvent::RunFailed)
        );
        assert_eq!(
            StreamEvent::from_frame(&frame("thread.run.step.created", "{}")).unwrap(),
            Some(StreamEvent::Other("thread.run.step.created".to_string()))
        );
        assert_eq!(StreamEvent::from_frame(&frame("done", "[DONE]")).unwrap(), None);
    }

    #[test]
    fn error_frame_is_transport_error() {
        let err = StreamEvent::from_frame(&frame("error", r#"{"message":"overloaded"}"#)).unwrap_err();
        assert!(matches!(err, Error::Transport(m) if m.contains("overloaded")));
    }

    #[tokio::test]
    async fn decodes_chunked_byte_stream() {
        let body = "event: thread.message.delta\ndata: {\"delta\":{\"content\":[{\"text\":{\"value\":\"Hi\"}}]}}\n\n\
                    event: thread.run.completed\ndata: {}\n\n\
                    event: done\ndata: [DONE]\n\n";
        let chunks: Vec<std::result::Result<Vec<u8>, std::io::Error>> = body
            .as_bytes()
            .chunks(7)
            .map(|c| Ok(c.to_vec()))
            .collect();

        let events: Vec<_> = decode_run_stream(futures::stream::iter(chunks))
            .collect::<Vec<_>>()
            .await
            .into_iter()
            .map(std::result::Result::unwrap)
            .collect();

        assert_eq!(
            events,
            vec![
                StreamEvent::MessageDelta(Some("Hi".to_string())),
                StreamEvent::RunCompleted,
            ]
        );
    }

    #[tokio::test]
    async fn read_error_ends_stream() {
        let chunks: Vec<std::result::Result<Vec<u8>, std::io::Error>> = vec![
            Ok(b"event: thread.run.step.created\ndata: {}\n\n".to_vec()),
            Err(std::io::Error::other("connection reset")),
            Ok(b"event: thread.run.completed\ndata: {}\n\n".to_vec()),
        ];

        let events = decode_run_stream(futures::stream::iter(chunks))
            .collect::<Vec<_>>()
            .await;

        assert_eq!(events.len(), 2);
        assert!(matches!(events[1], Err(Error::Transport(_))));
    }
}
