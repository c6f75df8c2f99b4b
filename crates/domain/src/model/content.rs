//! The tagged-sum content-block type.
//!
//! Every Item carries an ordered array of these. One variant per kind,
//! discriminated on the wire by a `type` field, following the approach
//! in DESIGN NOTES §9: unknown kinds round-trip through an `unknown{raw}`
//! variant rather than being dropped, so forward-compatible writers don't
//! lose data.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum Tagged {
    Text { text: String },
    InputText { text: String },
    OutputText { text: String },
    Image { url: String },
    File { file_id: String, filename: Option<String> },
    Reasoning { text: String },
    ToolCallId { call_id: String },
    FunctionCall {
        call_id: String,
        name: String,
        arguments: Value,
    },
    FunctionCallOutput {
        call_id: String,
        output: Value,
        #[serde(default)]
        error: Option<String>,
    },
    Audio { data: String, format: String },
    InputAudio { data: String, format: String },
    Code { language: String, code: String },
    ComputerScreenshot { image_url: String },
    ComputerAction { action: Value },
    Refusal { refusal: String },
}

impl From<Tagged> for Content {
    fn from(t: Tagged) -> Self {
        match t {
            Tagged::Text { text } => Content::Text { text },
            Tagged::InputText { text } => Content::InputText { text },
            Tagged::OutputText { text } => Content::OutputText { text },
            Tagged::Image { url } => Content::Image { url },
            Tagged::File { file_id, filename } => Content::File { file_id, filename },
            Tagged::Reasoning { text } => Content::Reasoning { text },
            Tagged::ToolCallId { call_id } => Content::ToolCallId { call_id },
            Tagged::FunctionCall { call_id, name, arguments } => {
                Content::FunctionCall { call_id, name, arguments }
            }
            Tagged::FunctionCallOutput { call_id, output, error } => {
                Content::FunctionCallOutput { call_id, output, error }
            }
            Tagged::Audio { data, format } => Content::Audio { data, format },
            Tagged::InputAudio { data, format } => Content::InputAudio { data, format },
            Tagged::Code { language, code } => Content::Code { language, code },
            Tagged::ComputerScreenshot { image_url } => Content::ComputerScreenshot { image_url },
            Tagged::ComputerAction { action } => Content::ComputerAction { action },
            Tagged::Refusal { refusal } => Content::Refusal { refusal },
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Content {
    Text { text: String },
    InputText { text: String },
    OutputText { text: String },
    Image { url: String },
    File { file_id: String, filename: Option<String> },
    Reasoning { text: String },
    ToolCallId { call_id: String },
    FunctionCall {
        call_id: String,
        name: String,
        arguments: Value,
    },
    FunctionCallOutput {
        call_id: String,
        output: Value,
        error: Option<String>,
    },
    Audio { data: String, format: String },
    InputAudio { data: String, format: String },
    Code { language: String, code: String },
    ComputerScreenshot { image_url: String },
    ComputerAction { action: Value },
    Refusal { refusal: String },
    /// Anything the reader didn't recognise — the original object is kept
    /// verbatim in `raw` so a round-trip through this type never loses data.
    Unknown { raw: Value },
}

impl Content {
    pub fn text(text: impl Into<String>) -> Self {
        Content::Text { text: text.into() }
    }

    fn as_tagged(&self) -> Option<Tagged> {
        Some(match self {
            Content::Text { text } => Tagged::Text { text: text.clone() },
            Content::InputText { text } => Tagged::InputText { text: text.clone() },
            Content::OutputText { text } => Tagged::OutputText { text: text.clone() },
            Content::Image { url } => Tagged::Image { url: url.clone() },
            Content::File { file_id, filename } => Tagged::File {
                file_id: file_id.clone(),
                filename: filename.clone(),
            },
            Content::Reasoning { text } => Tagged::Reasoning { text: text.clone() },
            Content::ToolCallId { call_id } => Tagged::ToolCallId { call_id: call_id.clone() },
            Content::FunctionCall { call_id, name, arguments } => Tagged::FunctionCall {
                call_id: call_id.clone(),
                name: name.clone(),
                arguments: arguments.clone(),
            },
            Content::FunctionCallOutput { call_id, output, error } => Tagged::FunctionCallOutput {
                call_id: call_id.clone(),
                output: output.clone(),
                error: error.clone(),
            },
            Content::Audio { data, format } => Tagged::Audio {
                data: data.clone(),
                format: format.clone(),
            },
            Content::InputAudio { data, format } => Tagged::InputAudio {
                data: data.clone(),
                format: format.clone(),
            },
            Content::Code { language, code } => Tagged::Code {
                language: language.clone(),
                code: code.clone(),
            },
            Content::ComputerScreenshot { image_url } => {
                Tagged::ComputerScreenshot { image_url: image_url.clone() }
            }
            Content::ComputerAction { action } => Tagged::ComputerAction { action: action.clone() },
            Content::Refusal { refusal } => Tagged::Refusal { refusal: refusal.clone() },
            Content::Unknown { .. } => return None,
        })
    }

    /// Kinds that must never survive into a Share snapshot (§8 invariant,
    /// §9 DESIGN NOTES sanitation).
    pub fn is_share_sensitive(&self) -> bool {
        matches!(
            self,
            Content::Audio { .. }
                | Content::InputAudio { .. }
                | Content::ComputerScreenshot { .. }
                | Content::ComputerAction { .. }
                | Content::Refusal { .. }
                | Content::Unknown { .. }
        )
    }

    /// A rough character count used by ContextBudgeter's token estimate.
    pub fn char_count(&self) -> usize {
        match self {
            Content::Text { text }
            | Content::InputText { text }
            | Content::OutputText { text }
            | Content::Reasoning { text } => text.chars().count(),
            Content::Image { url } => url.chars().count(),
            Content::File { file_id, filename } => {
                file_id.chars().count() + filename.as_ref().map_or(0, |f| f.chars().count())
            }
            Content::ToolCallId { call_id } => call_id.chars().count(),
            Content::FunctionCall { name, arguments, .. } => {
                name.chars().count() + arguments.to_string().chars().count()
            }
            Content::FunctionCallOutput { output, error, .. } => {
                output.to_string().chars().count() + error.as_ref().map_or(0, |e| e.chars().count())
            }
            Content::Audio { data, .. } | Content::InputAudio { data, .. } => data.chars().count(),
            Content::Code { code, .. } => code.chars().count(),
            Content::ComputerScreenshot { image_url } => image_url.chars().count(),
            Content::ComputerAction { action } => action.to_string().chars().count(),
            Content::Refusal { refusal } => refusal.chars().count(),
            Content::Unknown { raw } => raw.to_string().chars().count(),
        }
    }
}

impl Serialize for Content {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self.as_tagged() {
            Some(tagged) => tagged.serialize(serializer),
            None => match self {
                Content::Unknown { raw } => raw.serialize(serializer),
                _ => unreachable!("as_tagged only returns None for Unknown"),
            },
        }
    }
}

impl<'de> Deserialize<'de> for Content {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        match serde_json::from_value::<Tagged>(value.clone()) {
            Ok(tagged) => Ok(tagged.into()),
            Err(_) => Ok(Content::Unknown { raw: value }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_round_trips_through_json() {
        let c = Content::text("hello");
        let json = serde_json::to_string(&c).unwrap();
        assert!(json.contains(r#""type":"text""#));
        let back: Content = serde_json::from_str(&json).unwrap();
        assert_eq!(back, c);
    }

    #[test]
    fn unrecognised_type_round_trips_as_unknown() {
        let json = r#"{"type":"some_future_kind","payload":{"x":1}}"#;
        let c: Content = serde_json::from_str(json).unwrap();
        assert!(c.is_share_sensitive());
        let back = serde_json::to_string(&c).unwrap();
        let reparsed: Value = serde_json::from_str(&back).unwrap();
        let original: Value = serde_json::from_str(json).unwrap();
        assert_eq!(reparsed, original);
    }

    #[test]
    fn share_sensitive_kinds_are_flagged() {
        assert!(Content::Refusal { refusal: "no".into() }.is_share_sensitive());
        assert!(Content::Audio { data: "x".into(), format: "wav".into() }.is_share_sensitive());
        assert!(!Content::text("hi").is_share_sensitive());
    }
}
