use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::{ProjectError, ProjectField, ValidationErrors};
use crate::fs::FileSystem;
use crate::model::{Note, Project, PROJECT_EXTENSION};

pub const MAX_PROJECT_NAME_LEN: usize = 50;

const WELCOME_NOTE_TITLE: &str = "Welcome";
const WELCOME_NOTE_CONTENT: &str = "# Welcome to WanNote\n\nWrite markdown on the left, see it rendered on the right.\n\nPaste an image to store it in this project's `attachments` folder.\n";

/// Input of the "create project" form.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewProject {
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Directory the project folder is created in. Empty until one is picked.
    #[serde(default)]
    pub parent_dir: PathBuf,
}

impl NewProject {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        parent_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parent_dir: parent_dir.into(),
        }
    }

    /// Checks the form without touching disk.
    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();

        let name = self.name.trim();
        if name.is_empty() {
            errors.add(ProjectField::Name, "Project name is required");
        } else if self.name.chars().count() > MAX_PROJECT_NAME_LEN {
            errors.add(
                ProjectField::Name,
                format!("Project name must be {} characters or less", MAX_PROJECT_NAME_LEN),
            );
        } else if name.contains(['/', '\\']) || name == "." || name == ".." {
            errors.add(ProjectField::Name, "Project name cannot contain path separators");
        }

        if self.parent_dir.as_os_str().is_empty() {
            errors.add(
                ProjectField::ParentDir,
                "Please select a location to save the project",
            );
        }

        errors.into_result()
    }

    /// `<parent>/<name>/<name>.wan`, once both parts are filled in.
    pub fn project_path(&self) -> Option<PathBuf> {
        let name = self.name.trim();
        if name.is_empty() || self.parent_dir.as_os_str().is_empty() {
            return None;
        }
        Some(
            self.parent_dir
                .join(name)
                .join(format!("{}.{}", name, PROJECT_EXTENSION)),
        )
    }
}

/// Reads and writes project documents.
#[derive(Clone)]
pub struct ProjectStore {
    fs: Arc<dyn FileSystem>,
    welcome_note: bool,
}

impl ProjectStore {
    pub fn new(fs: Arc<dyn FileSystem>) -> Self {
        Self {
            fs,
            welcome_note: false,
        }
    }

    /// Seed newly created projects with a welcome note.
    pub fn with_welcome_note(mut self, enabled: bool) -> Self {
        self.welcome_note = enabled;
        self
    }

    /// Validates the form, creates the project folder and returns the new,
    /// not yet saved, project.
    pub async fn create(&self, form: &NewProject) -> Result<Project, ProjectError> {
        form.validate()?;
        let path = form.project_path().ok_or_else(|| {
            // validate() guarantees both parts are present
            ProjectError::Schema {
                path: form.parent_dir.clone(),
                message: "cannot derive project path".to_string(),
            }
        })?;

        if let Some(folder) = path.parent() {
            self.fs
                .create_dir_all(folder)
                .await
                .map_err(|e| ProjectError::io(folder, e))?;
        }

        let mut project = Project::new(form.name.trim(), form.description.trim(), path);
        if self.welcome_note {
            let id = project.next_note_id();
            project
                .notes
                .push(Note::new(id, WELCOME_NOTE_TITLE).with_content(WELCOME_NOTE_CONTENT));
        }
        log::info!("Created project folder for {}", project.path.display());
        Ok(project)
    }

    pub async fn load(&self, path: &Path) -> Result<Project, ProjectError> {
        let content = self
            .fs
            .read_text(path)
            .await
            .map_err(|e| ProjectError::io(path, e))?;
        let project = parse_project(&content, path)?;
        log::info!("Loaded project '{}' ({} notes)", project.name, project.notes.len());
        Ok(project)
    }

    /// Writes the project as pretty JSON to `project.path`.
    ///
    /// The document goes to a sibling temp file first and is then renamed over
    /// the target, so the previous version survives a failed write.
    pub async fn save(&self, project: &Project) -> Result<(), ProjectError> {
        let content = serde_json::to_string_pretty(project).map_err(ProjectError::Serialize)?;
        let target = &project.path;
        let tmp = temp_path_for(target);

        self.fs
            .write_text(&tmp, &content)
            .await
            .map_err(|e| ProjectError::io(&tmp, e))?;
        self.fs
            .rename(&tmp, target)
            .await
            .map_err(|e| ProjectError::io(target, e))?;

        log::info!("Saved project '{}' to {}", project.name, target.display());
        Ok(())
    }
}

fn temp_path_for(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Parses a project document, only insisting on `name` and `path`.
pub fn parse_project(content: &str, path: &Path) -> Result<Project, ProjectError> {
    if content.trim().is_empty() {
        return Err(ProjectError::EmptyFile {
            path: path.to_path_buf(),
        });
    }

    let value: Value = serde_json::from_str(content).map_err(|source| ProjectError::Parse {
        path: path.to_path_buf(),
        source,
    })?;

    let schema_err = |message: String| ProjectError::Schema {
        path: path.to_path_buf(),
        message,
    };

    let obj = value
        .as_object()
        .ok_or_else(|| schema_err("document root must be an object".to_string()))?;
    for key in ["name", "path"] {
        match obj.get(key) {
            Some(Value::String(_)) => {}
            Some(_) => return Err(schema_err(format!("'{}' must be a string", key))),
            None => return Err(schema_err(format!("missing required field '{}'", key))),
        }
    }

    serde_json::from_value(value).map_err(|e| schema_err(e.to_string()))
}
