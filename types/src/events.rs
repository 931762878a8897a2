use crate::audio::{Blob, RealtimeInput};
use crate::setup::Setup;
use crate::tools::{FunctionCall, FunctionResponse, ToolCall, ToolResponse};

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ClientMessage {
    Setup(Setup),
    RealtimeInput(RealtimeInput),
    ToolResponse(ToolResponse),
}

impl ClientMessage {
    pub fn media(blob: Blob) -> Self {
        Self::RealtimeInput(RealtimeInput::media(blob))
    }

    pub fn tool_responses(function_responses: Vec<FunctionResponse>) -> Self {
        Self::ToolResponse(ToolResponse { function_responses })
    }
}

/// One frame received from the realtime service. A frame may carry several
/// signals at once; see [`ServerMessage::events`].
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerMessage {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub setup_complete: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server_content: Option<ServerContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call: Option<ToolCall>,
}

#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerContent {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_turn: Option<ModelTurn>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub turn_complete: bool,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub interrupted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_transcription: Option<Transcription>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_transcription: Option<Transcription>,
}

#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ModelTurn {
    #[serde(default)]
    pub parts: Vec<Part>,
}

#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Part {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inline_data: Option<Blob>,
}

#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Transcription {
    #[serde(default)]
    pub text: String,
}

/// A classified inbound signal, in the order the controller must apply them.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundEvent {
    SetupComplete,
    OutputTranscription(String),
    InputTranscription(String),
    TurnComplete,
    ToolCall(Vec<FunctionCall>),
    Audio(Blob),
}

impl ServerMessage {
    pub fn setup_complete() -> Self {
        Self {
            setup_complete: Some(serde_json::json!({})),
            ..Self::default()
        }
    }

    pub fn is_setup_complete(&self) -> bool {
        self.setup_complete.is_some()
    }

    /// Splits the frame into the signals it carries.
    ///
    /// Transcriptions come before the turn boundary so a delta delivered in
    /// the same frame as `turnComplete` is cleared with its turn.
    pub fn events(self) -> Vec<InboundEvent> {
        let mut events = Vec::new();
        if self.setup_complete.is_some() {
            events.push(InboundEvent::SetupComplete);
        }
        if let Some(content) = self.server_content {
            if let Some(t) = content.output_transcription {
                events.push(InboundEvent::OutputTranscription(t.text));
            }
            if let Some(t) = content.input_transcription {
                events.push(InboundEvent::InputTranscription(t.text));
            }
            if content.turn_complete {
                events.push(InboundEvent::TurnComplete);
            }
            if let Some(turn) = content.model_turn {
                events.extend(
                    turn.parts
                        .into_iter()
                        .filter_map(|part| part.inline_data)
                        .filter(|blob| !blob.data.is_empty())
                        .map(InboundEvent::Audio),
                );
            }
        }
        if let Some(call) = self.tool_call {
            if !call.function_calls.is_empty() {
                events.push(InboundEvent::ToolCall(call.function_calls));
            }
        }
        events
    }
}

/// What the transport hands to the session: decoded frames, plus the
/// connection-level error and close signals.
#[derive(Debug, Clone, PartialEq)]
pub enum ServerEvent {
    Message(ServerMessage),
    Error(String),
    Close { reason: Option<String> },
}
