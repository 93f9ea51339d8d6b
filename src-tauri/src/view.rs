use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::commands::{self, CommandAction, CommandId, KeyModifiers, Platform};
use crate::editor::{EditorBuffer, TitleMode};
use crate::model::Timestamp;
use crate::project::NewProject;
use crate::session::{command_event, AppSessionController, Event, Screen};
use crate::settings::AppSettings;

// ---- Snapshot sent to the webview ----

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NoteSummary {
    pub id: String,
    pub title: String,
    pub updated_at: Timestamp,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectView {
    pub name: String,
    pub description: String,
    pub path: PathBuf,
    pub notes: Vec<NoteSummary>,
    pub active_index: Option<usize>,
    pub buffer: EditorBuffer,
    pub title_mode: TitleMode,
    pub unsaved: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct View {
    pub screen: Screen,
    pub settings: AppSettings,
    pub project: Option<ProjectView>,
    /// Inline "create project" errors keyed by form field.
    pub form_errors: BTreeMap<&'static str, String>,
}

impl View {
    pub fn of(controller: &AppSessionController) -> Self {
        let project = controller.editor().map(|editor| {
            let project = editor.project();
            ProjectView {
                name: project.name.clone(),
                description: project.description.clone(),
                path: project.path.clone(),
                notes: project
                    .notes
                    .iter()
                    .map(|n| NoteSummary {
                        id: n.id.clone(),
                        title: n.title.clone(),
                        updated_at: n.updated_at,
                    })
                    .collect(),
                active_index: editor.active_index(),
                buffer: editor.buffer().clone(),
                title_mode: editor.title_mode(),
                unsaved: editor.has_unsaved_changes(),
            }
        });

        let form_errors = controller
            .form_errors()
            .map(|errors| {
                errors
                    .iter()
                    .map(|e| (e.field.as_str(), e.message.clone()))
                    .collect()
            })
            .unwrap_or_default();

        Self {
            screen: controller.screen(),
            settings: controller.settings().clone(),
            project,
            form_errors,
        }
    }
}

// ---- Actions coming back from the webview ----

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum UiAction {
    NewProject,
    CancelNewProject,
    CreateProject { form: NewProject },
    OpenProject,
    Save,
    SwitchNote { index: usize },
    CreateNote,
    Close,
    Command { id: CommandId },
    Shortcut {
        key: String,
        #[serde(default)]
        modifiers: KeyModifiers,
    },
}

impl UiAction {
    /// Controller event for this action. Shortcuts and commands that belong to
    /// the text surface map to `None`.
    pub fn into_event(self, platform: Platform) -> Option<Event> {
        match self {
            UiAction::NewProject => Some(Event::NewProjectRequested),
            UiAction::CancelNewProject => Some(Event::NewProjectCancelled),
            UiAction::CreateProject { form } => Some(Event::CreateProject(form)),
            UiAction::OpenProject => Some(Event::OpenProjectRequested),
            UiAction::Save => Some(Event::SaveRequested),
            UiAction::SwitchNote { index } => Some(Event::SwitchNote(index)),
            UiAction::CreateNote => Some(Event::CreateNote),
            UiAction::Close => Some(Event::CloseRequested),
            UiAction::Command { id } => command_event(id),
            UiAction::Shortcut { key, modifiers } => {
                let id = commands::match_shortcut(&key, modifiers, platform)?;
                match commands::lookup(id)?.action {
                    CommandAction::Dispatch => command_event(id),
                    CommandAction::Native => None,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProjectError;
    use crate::model::{Note, Project};
    use crate::session::{AfterSave, LoadOrigin};
    use pretty_assertions::assert_eq;

    fn action(json: &str) -> UiAction {
        serde_json::from_str(json).unwrap()
    }

    fn opened() -> AppSessionController {
        let path = PathBuf::from("/tmp/Two/Two.wan");
        let mut project = Project::new("Two", "pair", path.clone());
        project.notes.push(Note::new("1", "A").with_content("alpha"));
        project.notes.push(Note::new("2", "B").with_content("beta"));

        let mut controller = AppSessionController::new();
        controller.update(Event::ProjectLoaded {
            path,
            origin: LoadOrigin::Picked,
            result: Ok::<_, ProjectError>(project),
        });
        controller
    }

    #[test]
    fn test_view_before_project() {
        let view = View::of(&AppSessionController::new());
        assert_eq!(view.screen, Screen::FirstRun);
        assert!(view.project.is_none());
        assert!(view.form_errors.is_empty());
    }

    #[test]
    fn test_view_of_open_project() {
        let mut controller = opened();
        controller.editor_mut().unwrap().set_content("alpha!");

        let view = View::of(&controller);
        let project = view.project.unwrap();
        assert_eq!(view.screen, Screen::ProjectOpen);
        assert_eq!(project.name, "Two");
        assert_eq!(
            project.notes.iter().map(|n| n.title.as_str()).collect::<Vec<_>>(),
            vec!["A", "B"]
        );
        assert_eq!(project.active_index, Some(0));
        assert_eq!(project.buffer.content, "alpha!");
        assert!(project.unsaved);
    }

    #[test]
    fn test_new_note_is_unsaved_until_persisted() {
        let mut controller = opened();
        controller.update(Event::CreateNote);

        let view = View::of(&controller);
        let project = view.project.unwrap();
        assert_eq!(project.active_index, Some(2));
        assert!(project.unsaved);

        controller.update(Event::ProjectPersisted {
            result: Ok(()),
            then: AfterSave::Nothing,
        });
        assert!(!View::of(&controller).project.unwrap().unsaved);
    }

    #[test]
    fn test_view_form_errors() {
        let mut controller = AppSessionController::new();
        controller.update(Event::CreateProject(NewProject::default()));

        let view = View::of(&controller);
        assert_eq!(
            view.form_errors.keys().copied().collect::<Vec<_>>(),
            vec!["name", "parentDir"]
        );
        let json = serde_json::to_value(&view).unwrap();
        assert_eq!(json["formErrors"]["name"], "Project name is required");
    }

    #[test]
    fn test_actions_from_json() {
        assert!(matches!(
            action(r#"{"type":"switchNote","index":2}"#).into_event(Platform::Other),
            Some(Event::SwitchNote(2))
        ));
        assert!(matches!(
            action(r#"{"type":"createProject","form":{"name":"Trip","parentDir":"/docs"}}"#)
                .into_event(Platform::Other),
            Some(Event::CreateProject(form)) if form.name == "Trip"
        ));
        assert!(matches!(
            action(r#"{"type":"command","id":"open-project"}"#).into_event(Platform::Other),
            Some(Event::OpenProjectRequested)
        ));
        assert!(matches!(
            action(r#"{"type":"cancelNewProject"}"#).into_event(Platform::Other),
            Some(Event::NewProjectCancelled)
        ));
        assert!(action(r#"{"type":"command","id":"paste"}"#)
            .into_event(Platform::Other)
            .is_none());
    }

    #[test]
    fn test_shortcut_actions() {
        let save = action(r#"{"type":"shortcut","key":"s","modifiers":{"meta":true}}"#);
        assert!(matches!(save.clone().into_event(Platform::MacOs), Some(Event::SaveRequested)));
        assert!(save.into_event(Platform::Other).is_none());

        let quit = action(r#"{"type":"shortcut","key":"q","modifiers":{"ctrl":true}}"#);
        assert!(matches!(quit.into_event(Platform::Other), Some(Event::CloseRequested)));

        let plain = action(r#"{"type":"shortcut","key":"s"}"#);
        assert!(plain.into_event(Platform::Other).is_none());
    }
}
