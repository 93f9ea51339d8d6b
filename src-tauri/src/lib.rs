pub mod attachments;
pub mod commands;
pub mod editor;
pub mod error;
pub mod fs;
pub mod model;
pub mod project;
pub mod runtime;
pub mod session;
pub mod settings;
pub mod view;

#[cfg(feature = "desktop")]
mod desktop;

pub use attachments::{AttachmentResolver, CacheState, StoredAttachment};
pub use editor::{EditorBuffer, NoteEditorSession, TitleInput, TitleMode};
pub use error::{
    AttachmentError, EditorError, ProjectError, SessionError, SettingsError, ValidationErrors,
};
pub use fs::{FileSystem, LocalFs};
pub use model::{Attachment, Note, Project};
pub use project::{NewProject, ProjectStore};
pub use runtime::{Runtime, Shell};
pub use session::{AppSessionController, CloseChoice, Effect, Event, Notice, Screen};
pub use settings::{AppSettings, SettingsStore, Theme};

#[cfg(feature = "desktop")]
pub use desktop::run;

/// Installs the `env_logger` backend, `info` unless `RUST_LOG` says otherwise.
pub fn init_logging() {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .try_init();
}
