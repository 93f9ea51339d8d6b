use async_trait::async_trait;
use std::collections::VecDeque;
use std::ops::Range;
use std::path::PathBuf;
use std::sync::Arc;

use crate::attachments::AttachmentResolver;
use crate::error::AttachmentError;
use crate::project::ProjectStore;
use crate::session::{AppSessionController, CloseChoice, Effect, Event, Notice};
use crate::settings::SettingsStore;

/// Platform surfaces the session needs: file picker, notifications, the
/// close prompt and process exit.
#[async_trait]
pub trait Shell: Send + Sync {
    /// Asks for a project file; `None` when the user cancels.
    async fn pick_project_file(&self) -> Option<PathBuf>;
    async fn notify(&self, notice: &Notice);
    async fn confirm_close(&self) -> CloseChoice;
    async fn exit(&self);
}

/// Drives the controller: feeds it events and carries out its effects.
pub struct Runtime {
    controller: AppSessionController,
    projects: ProjectStore,
    settings: SettingsStore,
    attachments: AttachmentResolver,
    shell: Arc<dyn Shell>,
}

impl Runtime {
    pub fn new(
        projects: ProjectStore,
        settings: SettingsStore,
        attachments: AttachmentResolver,
        shell: Arc<dyn Shell>,
    ) -> Self {
        Self {
            controller: AppSessionController::new(),
            projects,
            settings,
            attachments,
            shell,
        }
    }

    pub fn controller(&self) -> &AppSessionController {
        &self.controller
    }

    pub fn controller_mut(&mut self) -> &mut AppSessionController {
        &mut self.controller
    }

    pub fn attachments(&self) -> &AttachmentResolver {
        &self.attachments
    }

    /// Loads (or repairs) settings and routes to the first screen.
    pub async fn start(&mut self) {
        let settings = self.settings.load_or_create();
        log::info!("Settings loaded from {}", self.settings.path().display());
        self.dispatch(Event::Started(settings)).await;
    }

    /// Handles `event` and every follow-up event its effects produce, in order.
    pub async fn dispatch(&mut self, event: Event) {
        let mut queue = VecDeque::from([event]);
        while let Some(event) = queue.pop_front() {
            for effect in self.controller.update(event) {
                if let Some(next) = self.execute(effect).await {
                    queue.push_back(next);
                }
            }
        }
    }

    async fn execute(&mut self, effect: Effect) -> Option<Event> {
        match effect {
            Effect::PersistSettings(settings) => {
                self.settings.save(&settings);
                None
            }
            Effect::PickProjectFile => Some(Event::ProjectFilePicked(
                self.shell.pick_project_file().await,
            )),
            Effect::LoadProject { path, origin } => {
                let result = self.projects.load(&path).await;
                Some(Event::ProjectLoaded {
                    path,
                    origin,
                    result,
                })
            }
            Effect::CreateProject(form) => {
                let result = match self.projects.create(&form).await {
                    Ok(project) => self.projects.save(&project).await.map(|()| project),
                    Err(e) => Err(e),
                };
                Some(Event::ProjectCreated(result))
            }
            Effect::PersistProject { project, then } => {
                let result = self.projects.save(&project).await;
                Some(Event::ProjectPersisted { result, then })
            }
            Effect::Notify(notice) => {
                self.shell.notify(&notice).await;
                None
            }
            Effect::ConfirmClose => Some(Event::CloseChosen(self.shell.confirm_close().await)),
            Effect::Exit => {
                log::info!("Exiting");
                self.shell.exit().await;
                None
            }
        }
    }

    /// Stores pasted image bytes beside the open project and inserts the
    /// reference at `selection`. Returns the new cursor, or `None` when no
    /// note is open.
    pub async fn paste_image(
        &mut self,
        bytes: &[u8],
        suggested_name: &str,
        selection: Range<usize>,
    ) -> Result<Option<usize>, AttachmentError> {
        let Some(editor) = self.controller.editor_mut() else {
            return Ok(None);
        };
        if editor.active_index().is_none() {
            return Ok(None);
        }
        let project_path = editor.project().path.clone();
        let stored = self
            .attachments
            .store(bytes, suggested_name, &project_path)
            .await?;
        Ok(Some(editor.attach(&stored, selection)))
    }

    /// Buffer content of the active note with attachment images embedded.
    pub async fn render_active_note(&self) -> Option<String> {
        let editor = self.controller.editor()?;
        editor.active_index()?;
        Some(
            self.attachments
                .resolve(&editor.buffer().content, &editor.project().path)
                .await,
        )
    }
}
