use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// File extension of project documents.
pub const PROJECT_EXTENSION: &str = "wan";

/// Title given to a note whose title is left blank.
pub const UNTITLED_NOTE: &str = "Untitled Note";

pub type Timestamp = DateTime<Utc>;

pub fn now() -> Timestamp {
    Utc::now()
}

// ---- Project ----

/// A project document: metadata plus an ordered list of notes.
///
/// `path` is where the document lives and doubles as its identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub path: PathBuf,
    #[serde(default)]
    pub created_at: Timestamp,
    #[serde(default)]
    pub updated_at: Timestamp,
    #[serde(default)]
    pub notes: Vec<Note>,
}

impl Project {
    pub fn new(name: impl Into<String>, description: impl Into<String>, path: PathBuf) -> Self {
        let created = now();
        Self {
            name: name.into(),
            description: description.into(),
            path,
            created_at: created,
            updated_at: created,
            notes: Vec::new(),
        }
    }

    pub fn touch(&mut self) {
        self.updated_at = now();
    }

    /// Next free note id: `count + 1`, bumped past ids already in use.
    pub fn next_note_id(&self) -> String {
        let mut n = self.notes.len() + 1;
        while self.notes.iter().any(|note| note.id == n.to_string()) {
            n += 1;
        }
        n.to_string()
    }
}

// ---- Note ----

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Note {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub created_at: Timestamp,
    #[serde(default)]
    pub updated_at: Timestamp,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attachments: Option<Vec<Attachment>>,
}

impl Note {
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        let created = now();
        Self {
            id: id.into(),
            title: title.into(),
            content: String::new(),
            created_at: created,
            updated_at: created,
            tags: Some(Vec::new()),
            attachments: Some(Vec::new()),
        }
    }

    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = content.into();
        self
    }

    pub fn attachments(&self) -> &[Attachment] {
        self.attachments.as_deref().unwrap_or(&[])
    }
}

// ---- Attachment ----

/// Metadata for a file stored in the project's `attachments` directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
    pub id: String,
    pub filename: String,
    pub filetype: String,
    pub filesize: u64,
    #[serde(default)]
    pub created_at: Timestamp,
    #[serde(default)]
    pub updated_at: Timestamp,
}
