//! Application-level session: which screen is showing, which project is
//! open, and the open/create/save/close flows.
//!
//! [`AppSessionController::update`] is a pure transition: it takes an
//! [`Event`], mutates the controller and returns the [`Effect`]s the runtime
//! must carry out. Effects that produce a result feed it back as a new event.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::commands::CommandId;
use crate::editor::{NoteEditorSession, PendingSwitch};
use crate::error::{ProjectError, ValidationErrors};
use crate::model::Project;
use crate::project::NewProject;
use crate::settings::AppSettings;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Screen {
    FirstRun,
    NewProject,
    ProjectOpen,
}

/// Why a project is being loaded; decides how a failure is handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOrigin {
    /// Reopening `lastOpenedProject` at startup.
    Resume,
    /// Chosen in the file picker.
    Picked,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CloseChoice {
    SaveAndClose,
    CloseWithoutSaving,
    Cancel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum NoticeLevel {
    Info,
    Success,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub title: String,
    pub message: String,
}

impl Notice {
    fn new(level: NoticeLevel, title: &str, message: impl Into<String>) -> Self {
        Self {
            level,
            title: title.to_string(),
            message: message.into(),
        }
    }
}

/// What to do once a project save succeeds.
#[derive(Debug, Clone, PartialEq)]
pub enum AfterSave {
    Nothing,
    Switch(PendingSwitch),
    Exit,
}

#[derive(Debug)]
pub enum Event {
    Started(AppSettings),
    NewProjectRequested,
    /// The "create project" form was dismissed (Esc or Cancel).
    NewProjectCancelled,
    CreateProject(NewProject),
    /// Result of creating and saving a new project.
    ProjectCreated(Result<Project, ProjectError>),
    OpenProjectRequested,
    ProjectFilePicked(Option<PathBuf>),
    ProjectLoaded {
        path: PathBuf,
        origin: LoadOrigin,
        result: Result<Project, ProjectError>,
    },
    SaveRequested,
    SwitchNote(usize),
    CreateNote,
    ProjectPersisted {
        result: Result<(), ProjectError>,
        then: AfterSave,
    },
    CloseRequested,
    CloseChosen(CloseChoice),
    Command(CommandId),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    PersistSettings(AppSettings),
    PickProjectFile,
    LoadProject { path: PathBuf, origin: LoadOrigin },
    CreateProject(NewProject),
    PersistProject { project: Project, then: AfterSave },
    Notify(Notice),
    ConfirmClose,
    Exit,
}

pub struct AppSessionController {
    settings: AppSettings,
    screen: Screen,
    /// Screen to go back to when the "create project" form is dismissed.
    return_screen: Screen,
    editor: Option<NoteEditorSession>,
    form_errors: Option<ValidationErrors>,
    close_prompt_open: bool,
}

impl Default for AppSessionController {
    fn default() -> Self {
        Self::new()
    }
}

impl AppSessionController {
    pub fn new() -> Self {
        Self {
            settings: AppSettings::default(),
            screen: Screen::FirstRun,
            return_screen: Screen::FirstRun,
            editor: None,
            form_errors: None,
            close_prompt_open: false,
        }
    }

    pub fn screen(&self) -> Screen {
        self.screen
    }

    pub fn settings(&self) -> &AppSettings {
        &self.settings
    }

    pub fn editor(&self) -> Option<&NoteEditorSession> {
        self.editor.as_ref()
    }

    /// Buffer-level edits (typing, title, paste) go straight to the session.
    pub fn editor_mut(&mut self) -> Option<&mut NoteEditorSession> {
        self.editor.as_mut()
    }

    /// Inline errors of the last rejected "create project" submission.
    pub fn form_errors(&self) -> Option<&ValidationErrors> {
        self.form_errors.as_ref()
    }

    pub fn update(&mut self, event: Event) -> Vec<Effect> {
        match event {
            Event::Started(settings) => self.on_started(settings),
            Event::NewProjectRequested => {
                if self.screen != Screen::NewProject {
                    self.return_screen = self.screen;
                }
                self.screen = Screen::NewProject;
                self.form_errors = None;
                vec![]
            }
            Event::NewProjectCancelled => {
                if self.screen == Screen::NewProject {
                    self.screen = match self.editor {
                        Some(_) => Screen::ProjectOpen,
                        None => self.return_screen,
                    };
                }
                self.form_errors = None;
                vec![]
            }
            Event::CreateProject(form) => match form.validate() {
                Ok(()) => {
                    self.form_errors = None;
                    vec![Effect::CreateProject(form)]
                }
                Err(errors) => {
                    self.form_errors = Some(errors);
                    vec![]
                }
            },
            Event::ProjectCreated(Ok(project)) => {
                let path = project.path.clone();
                self.open_project(project, path)
            }
            Event::ProjectCreated(Err(ProjectError::Validation(errors))) => {
                self.form_errors = Some(errors);
                vec![]
            }
            Event::ProjectCreated(Err(e)) => {
                log::error!("Error creating project: {}", e);
                vec![Effect::Notify(Notice::new(
                    NoticeLevel::Error,
                    "Error",
                    format!("Failed to create project file: {}", e),
                ))]
            }
            Event::OpenProjectRequested => vec![Effect::PickProjectFile],
            Event::ProjectFilePicked(None) => vec![Effect::Notify(Notice::new(
                NoticeLevel::Info,
                "Info",
                "No project selected.",
            ))],
            Event::ProjectFilePicked(Some(path)) => vec![Effect::LoadProject {
                path,
                origin: LoadOrigin::Picked,
            }],
            Event::ProjectLoaded {
                path,
                origin,
                result,
            } => match result {
                Ok(project) => self.open_project(project, path),
                Err(e) => self.on_load_failed(path, origin, e),
            },
            Event::SaveRequested => match self.editor.as_mut() {
                Some(editor) => vec![Effect::PersistProject {
                    project: editor.commit_for_save().clone(),
                    then: AfterSave::Nothing,
                }],
                None => vec![],
            },
            Event::SwitchNote(index) => self.on_switch(index),
            Event::CreateNote => {
                if let Some(editor) = self.editor.as_mut() {
                    editor.create_note();
                }
                vec![]
            }
            Event::ProjectPersisted { result, then } => self.on_persisted(result, then),
            Event::CloseRequested => self.on_close_requested(),
            Event::CloseChosen(choice) => self.on_close_chosen(choice),
            Event::Command(id) => match command_event(id) {
                Some(event) => self.update(event),
                None => vec![],
            },
        }
    }

    fn on_started(&mut self, settings: AppSettings) -> Vec<Effect> {
        let mut effects = Vec::new();
        let first_run = settings.first_time_setup;
        self.settings = settings;

        if first_run {
            self.settings.first_time_setup = false;
            effects.push(Effect::PersistSettings(self.settings.clone()));
        }
        self.screen = if first_run {
            Screen::FirstRun
        } else {
            Screen::NewProject
        };
        self.return_screen = self.screen;

        if let Some(path) = self.settings.last_opened_project.clone() {
            effects.push(Effect::LoadProject {
                path,
                origin: LoadOrigin::Resume,
            });
        }
        effects
    }

    /// Installs `project`, read from `path`. The file location wins over the
    /// `path` stored inside the document, which goes stale when a project
    /// file is moved or copied.
    fn open_project(&mut self, mut project: Project, path: PathBuf) -> Vec<Effect> {
        if project.path != path {
            log::warn!(
                "Project file {} records its location as {}, using the file location",
                path.display(),
                project.path.display()
            );
            project.path = path.clone();
        }
        match self.editor.as_mut() {
            Some(editor) => editor.adopt(project),
            None => self.editor = Some(NoteEditorSession::new(project)),
        }
        self.screen = Screen::ProjectOpen;
        self.form_errors = None;

        if self.settings.last_opened_project.as_ref() == Some(&path) {
            return vec![];
        }
        self.settings.last_opened_project = Some(path);
        vec![Effect::PersistSettings(self.settings.clone())]
    }

    fn on_load_failed(&mut self, path: PathBuf, origin: LoadOrigin, e: ProjectError) -> Vec<Effect> {
        log::error!("Error loading project {}: {}", path.display(), e);
        match origin {
            LoadOrigin::Picked => vec![Effect::Notify(Notice::new(
                NoticeLevel::Error,
                "Error",
                format!("Failed to load project: {}", e),
            ))],
            LoadOrigin::Resume => {
                let mut effects = Vec::new();
                if self.settings.last_opened_project.as_ref() == Some(&path) {
                    log::warn!("Forgetting stale last project {}", path.display());
                    self.settings.last_opened_project = None;
                    effects.push(Effect::PersistSettings(self.settings.clone()));
                }
                effects.push(Effect::Notify(Notice::new(
                    NoticeLevel::Warning,
                    "Warning",
                    format!("Could not reopen the last project: {}", e),
                )));
                effects
            }
        }
    }

    fn on_switch(&mut self, index: usize) -> Vec<Effect> {
        let Some(editor) = self.editor.as_mut() else {
            return vec![];
        };
        match editor.begin_switch(index) {
            Ok(Some(pending)) => vec![Effect::PersistProject {
                project: editor.project().clone(),
                then: AfterSave::Switch(pending),
            }],
            Ok(None) => vec![],
            Err(e) => {
                log::warn!("Ignoring note switch: {}", e);
                vec![]
            }
        }
    }

    fn on_persisted(&mut self, result: Result<(), ProjectError>, then: AfterSave) -> Vec<Effect> {
        if let Err(e) = result {
            log::error!("Error saving project: {}", e);
            return vec![Effect::Notify(Notice::new(
                NoticeLevel::Error,
                "Error",
                format!("Failed to save project: {}", e),
            ))];
        }
        if let Some(editor) = self.editor.as_mut() {
            editor.mark_saved();
        }

        match then {
            AfterSave::Nothing => {
                let message = match self.editor.as_ref().and_then(|e| e.active_note()) {
                    Some(note) => format!("Note \"{}\" has been saved successfully.", note.title),
                    None => "Project has been saved successfully.".to_string(),
                };
                vec![Effect::Notify(Notice::new(
                    NoticeLevel::Success,
                    "Note Saved",
                    message,
                ))]
            }
            AfterSave::Switch(pending) => {
                if let Some(editor) = self.editor.as_mut() {
                    editor.finish_switch(pending);
                }
                vec![]
            }
            AfterSave::Exit => vec![Effect::Exit],
        }
    }

    fn on_close_requested(&mut self) -> Vec<Effect> {
        // An open project is prompted for even while another screen shows.
        if self.editor.is_none() {
            return vec![Effect::Exit];
        }
        if self.close_prompt_open {
            return vec![];
        }
        self.close_prompt_open = true;
        vec![Effect::ConfirmClose]
    }

    fn on_close_chosen(&mut self, choice: CloseChoice) -> Vec<Effect> {
        self.close_prompt_open = false;
        match choice {
            CloseChoice::SaveAndClose => match self.editor.as_mut() {
                Some(editor) => vec![Effect::PersistProject {
                    project: editor.commit_for_save().clone(),
                    then: AfterSave::Exit,
                }],
                None => vec![Effect::Exit],
            },
            CloseChoice::CloseWithoutSaving => vec![Effect::Exit],
            CloseChoice::Cancel => vec![],
        }
    }
}

/// Controller event behind a command-table entry. Native edit commands have
/// none.
pub fn command_event(id: CommandId) -> Option<Event> {
    match id {
        CommandId::OpenProject => Some(Event::OpenProjectRequested),
        CommandId::NewProject => Some(Event::NewProjectRequested),
        CommandId::NewNote => Some(Event::CreateNote),
        CommandId::Save => Some(Event::SaveRequested),
        CommandId::Quit => Some(Event::CloseRequested),
        CommandId::Undo
        | CommandId::Redo
        | CommandId::Cut
        | CommandId::Copy
        | CommandId::Paste
        | CommandId::SelectAll => None,
    }
}
