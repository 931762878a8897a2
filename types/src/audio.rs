/// Audio data encoded as base64
pub type Base64EncodedAudioBytes = String;

/// An inline media payload, used both for outbound realtime input and
/// inbound synthesized audio.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Blob {
    /// Base64 encoded bytes.
    pub data: Base64EncodedAudioBytes,

    /// ex: "audio/pcm;rate=16000"
    #[serde(default)]
    pub mime_type: String,
}

impl Blob {
    pub fn new(data: Base64EncodedAudioBytes, mime_type: &str) -> Self {
        Self {
            data,
            mime_type: mime_type.to_string(),
        }
    }
}

/// `realtimeInput` payload carrying one or more media chunks.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RealtimeInput {
    pub media_chunks: Vec<Blob>,
}

impl RealtimeInput {
    pub fn media(blob: Blob) -> Self {
        Self {
            media_chunks: vec![blob],
        }
    }
}
