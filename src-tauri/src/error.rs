use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

// ---- Validation ----

/// Form field of the "create project" dialog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ProjectField {
    Name,
    ParentDir,
}

impl ProjectField {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProjectField::Name => "name",
            ProjectField::ParentDir => "parentDir",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: ProjectField,
    pub message: String,
}

/// User-correctable input problems, one entry per offending field.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationErrors {
    errors: Vec<FieldError>,
}

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a message for `field`. A later message for the same field wins.
    pub fn add(&mut self, field: ProjectField, message: impl Into<String>) {
        let message = message.into();
        match self.errors.iter_mut().find(|e| e.field == field) {
            Some(existing) => existing.message = message,
            None => self.errors.push(FieldError { field, message }),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn get(&self, field: ProjectField) -> Option<&str> {
        self.errors
            .iter()
            .find(|e| e.field == field)
            .map(|e| e.message.as_str())
    }

    pub fn fields(&self) -> Vec<ProjectField> {
        self.errors.iter().map(|e| e.field).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &FieldError> {
        self.errors.iter()
    }

    pub fn into_result(self) -> Result<(), ValidationErrors> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .errors
            .iter()
            .map(|e| format!("{}: {}", e.field.as_str(), e.message))
            .collect();
        write!(f, "{}", parts.join("; "))
    }
}

impl std::error::Error for ValidationErrors {}

// ---- Project documents ----

#[derive(Debug, Error)]
pub enum ProjectError {
    #[error("invalid project: {0}")]
    Validation(#[from] ValidationErrors),

    #[error("project file {} is empty", .path.display())]
    EmptyFile { path: PathBuf },

    #[error("project file {} is not valid JSON: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("project file {} is not a WanNote project: {message}", .path.display())]
    Schema { path: PathBuf, message: String },

    #[error("failed to access {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize project: {0}")]
    Serialize(#[source] serde_json::Error),
}

impl ProjectError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ProjectError::Io {
            path: path.into(),
            source,
        }
    }
}

// ---- Settings ----

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to write settings to {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize settings: {0}")]
    Json(#[from] serde_json::Error),
}

// ---- Attachments ----

#[derive(Debug, Error)]
pub enum AttachmentError {
    #[error("attachment I/O failed for {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("'{0}' is not a valid attachment file name")]
    InvalidName(String),

    #[error("project path {} has no parent directory", .0.display())]
    NoProjectDir(PathBuf),
}

// ---- Editor ----

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EditorError {
    #[error("note index {index} is out of range (project has {len} notes)")]
    NoteOutOfRange { index: usize, len: usize },
}

/// Failure of an editor operation that also touches disk.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Editor(#[from] EditorError),

    #[error(transparent)]
    Project(#[from] ProjectError),
}

// ---- Commands ----

/// Identifier that names no entry of the command table.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown command '{0}'")]
pub struct UnknownCommand(pub String);
