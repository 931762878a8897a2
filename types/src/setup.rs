use crate::tools::{FunctionDeclaration, Tool};

/// The configuration payload sent as the first message of a realtime session.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Setup {
    /// Target model, ex: "models/gemini-2.5-flash-native-audio-preview-12-2025"
    model: String,

    generation_config: GenerationConfig,

    /// The system instructions prepended to model calls.
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content>,

    /// Tools(Functions) available to the model.
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    tools: Vec<Tool>,

    /// Present (as an empty object) to enable transcription of user audio.
    #[serde(skip_serializing_if = "Option::is_none")]
    input_audio_transcription: Option<AudioTranscriptionConfig>,

    /// Present (as an empty object) to enable transcription of model audio.
    #[serde(skip_serializing_if = "Option::is_none")]
    output_audio_transcription: Option<AudioTranscriptionConfig>,
}

impl Setup {
    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn response_modalities(&self) -> &[Modality] {
        &self.generation_config.response_modalities
    }

    pub fn system_instruction(&self) -> Option<&str> {
        self.system_instruction
            .as_ref()
            .and_then(|content| content.parts.first())
            .map(|part| part.text.as_str())
    }

    pub fn function_declarations(&self) -> impl Iterator<Item = &FunctionDeclaration> {
        self.tools.iter().flat_map(|tool| tool.function_declarations.iter())
    }

    pub fn transcribes_input(&self) -> bool {
        self.input_audio_transcription.is_some()
    }

    pub fn transcribes_output(&self) -> bool {
        self.output_audio_transcription.is_some()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Modality {
    Text,
    Audio,
}

#[derive(Debug, Clone, PartialEq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    response_modalities: Vec<Modality>,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Content {
    parts: Vec<TextPart>,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct TextPart {
    text: String,
}

#[derive(Debug, Clone, PartialEq, Default, serde::Serialize, serde::Deserialize)]
pub struct AudioTranscriptionConfig {}

pub struct SetupConfigurator {
    setup: Setup,
}

impl SetupConfigurator {
    pub fn new(model: &str) -> Self {
        let model = if model.starts_with("models/") {
            model.to_string()
        } else {
            format!("models/{model}")
        };
        Self {
            setup: Setup {
                model,
                generation_config: GenerationConfig::default(),
                system_instruction: None,
                tools: vec![],
                input_audio_transcription: None,
                output_audio_transcription: None,
            },
        }
    }

    pub fn with_modalities_enable_audio(mut self) -> Self {
        self.setup.generation_config.response_modalities = vec![Modality::Audio];
        self
    }

    pub fn with_instructions(mut self, instructions: &str) -> Self {
        self.setup.system_instruction = Some(Content {
            parts: vec![TextPart {
                text: instructions.to_string(),
            }],
        });
        self
    }

    pub fn with_function_declarations(mut self, declarations: Vec<FunctionDeclaration>) -> Self {
        self.setup.tools = vec![Tool {
            function_declarations: declarations,
        }];
        self
    }

    pub fn with_input_audio_transcription_enable(mut self) -> Self {
        self.setup.input_audio_transcription = Some(AudioTranscriptionConfig::default());
        self
    }

    pub fn with_output_audio_transcription_enable(mut self) -> Self {
        self.setup.output_audio_transcription = Some(AudioTranscriptionConfig::default());
        self
    }

    pub fn build(self) -> Setup {
        self.setup
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serialize() {
        let setup = SetupConfigurator::new("gemini-live")
            .with_modalities_enable_audio()
            .with_instructions("be brief")
            .with_input_audio_transcription_enable()
            .with_output_audio_transcription_enable()
            .build();
        let json = serde_json::to_value(&setup).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "model": "models/gemini-live",
                "generationConfig": {"responseModalities": ["AUDIO"]},
                "systemInstruction": {"parts": [{"text": "be brief"}]},
                "inputAudioTranscription": {},
                "outputAudioTranscription": {}
            })
        );
    }

    #[test]
    fn test_model_prefix_is_not_doubled() {
        let setup = SetupConfigurator::new("models/gemini-live").build();
        assert_eq!(setup.model(), "models/gemini-live");
        assert_eq!(setup.system_instruction(), None);
        assert!(!setup.transcribes_input());
    }
}
