use serde::{ Deserialize, Serialize };
use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Model,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::User => write!(f, "user"),
            Role::Model => write!(f, "model"),
        }
    }
}

/// Base64 payload of an attached file.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Blob {
    pub mime_type: String,
    pub data: String,
}

/// One fragment of a message. Serialized in the shape the generation API
/// expects: `{"text": ..}` or `{"inline_data": {..}}`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Part {
    Text {
        text: String,
    },
    InlineData {
        inline_data: Blob,
    },
}

impl Part {
    pub fn text(text: impl Into<String>) -> Self {
        Part::Text { text: text.into() }
    }

    pub fn attachment(mime_type: impl Into<String>, data: impl Into<String>) -> Self {
        Part::InlineData {
            inline_data: Blob {
                mime_type: mime_type.into(),
                data: data.into(),
            },
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Part::Text { text } => Some(text),
            Part::InlineData { .. } => None,
        }
    }

    pub fn is_attachment(&self) -> bool {
        matches!(self, Part::InlineData { .. })
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub parts: Vec<Part>,
    #[serde(rename = "isLocal", default)]
    pub is_local: bool,
}

impl Message {
    pub fn local_user(parts: Vec<Part>) -> Self {
        Self { role: Role::User, parts, is_local: true }
    }

    pub fn local_model(text: impl Into<String>) -> Self {
        Self { role: Role::Model, parts: vec![Part::text(text)], is_local: true }
    }

    /// First text fragment, or an empty string for attachment-only messages.
    pub fn text(&self) -> &str {
        self.parts
            .iter()
            .find_map(Part::as_text)
            .unwrap_or("")
    }

    pub fn has_attachment(&self) -> bool {
        self.parts.iter().any(Part::is_attachment)
    }

    /// Same message as seen by another widget instance.
    pub fn into_remote(mut self) -> Self {
        self.is_local = false;
        self
    }
}
