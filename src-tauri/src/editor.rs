use serde::{Deserialize, Serialize};
use std::ops::Range;

use crate::attachments::StoredAttachment;
use crate::error::{EditorError, ProjectError, SessionError};
use crate::model::{now, Attachment, Note, Project, UNTITLED_NOTE};
use crate::project::ProjectStore;

/// Text inserted by the Tab key.
pub const INDENT: &str = "  ";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum TitleMode {
    #[default]
    Viewing,
    Editing,
}

/// Interactions with the note title.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "camelCase")]
pub enum TitleInput {
    Click,
    Change(String),
    Blur,
    Enter,
}

/// Working copy of the active note.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EditorBuffer {
    pub title: String,
    pub content: String,
    pub attachments: Vec<Attachment>,
}

impl EditorBuffer {
    fn from_note(note: &Note) -> Self {
        Self {
            title: note.title.clone(),
            content: note.content.clone(),
            attachments: note.attachments().to_vec(),
        }
    }
}

/// A note switch whose outgoing half (commit) is done and whose incoming half
/// waits for the project to be persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingSwitch {
    from: usize,
    to: usize,
}

impl PendingSwitch {
    pub fn target(&self) -> usize {
        self.to
    }
}

fn byte_offset(s: &str, char_idx: usize) -> usize {
    s.char_indices()
        .nth(char_idx)
        .map(|(b, _)| b)
        .unwrap_or(s.len())
}

/// Owns the open project, which note is active, and the edit buffer.
///
/// The buffer is a copy of the active note; it is written back ("committed")
/// on save, on switch and before a new note is created. The persisted document
/// therefore never contains a half-typed edit unless it was committed.
#[derive(Debug, Clone)]
pub struct NoteEditorSession {
    project: Project,
    active: usize,
    buffer: EditorBuffer,
    title_mode: TitleMode,
    /// Committed in memory but not yet written to disk.
    unsaved: bool,
}

impl NoteEditorSession {
    pub fn new(project: Project) -> Self {
        let buffer = project
            .notes
            .first()
            .map(EditorBuffer::from_note)
            .unwrap_or_default();
        Self {
            project,
            active: 0,
            buffer,
            title_mode: TitleMode::Viewing,
            unsaved: false,
        }
    }

    pub fn project(&self) -> &Project {
        &self.project
    }

    pub fn notes(&self) -> &[Note] {
        &self.project.notes
    }

    /// `None` while the project has no notes.
    pub fn active_index(&self) -> Option<usize> {
        (self.active < self.project.notes.len()).then_some(self.active)
    }

    pub fn active_note(&self) -> Option<&Note> {
        self.project.notes.get(self.active)
    }

    pub fn buffer(&self) -> &EditorBuffer {
        &self.buffer
    }

    pub fn title_mode(&self) -> TitleMode {
        self.title_mode
    }

    // ---- Buffer edits ----

    pub fn set_content(&mut self, content: impl Into<String>) {
        self.buffer.content = content.into();
    }

    /// Replaces the selection (char offsets) with `text`; returns the cursor
    /// position after the inserted text.
    pub fn insert_text(&mut self, selection: Range<usize>, text: &str) -> usize {
        let content = &self.buffer.content;
        let (start, end) = if selection.start <= selection.end {
            (selection.start, selection.end)
        } else {
            (selection.end, selection.start)
        };
        let start_b = byte_offset(content, start);
        let end_b = byte_offset(content, end);
        let cursor = content[..start_b].chars().count() + text.chars().count();
        self.buffer.content.replace_range(start_b..end_b, text);
        cursor
    }

    pub fn indent(&mut self, selection: Range<usize>) -> usize {
        self.insert_text(selection, INDENT)
    }

    /// Inserts the markdown for a freshly stored image at the cursor and
    /// records its metadata on the note.
    pub fn attach(&mut self, stored: &StoredAttachment, selection: Range<usize>) -> usize {
        self.buffer.attachments.push(stored.attachment.clone());
        self.insert_text(selection, &stored.reference)
    }

    /// Click enters editing, blur or Enter leaves it. A blank title becomes
    /// "Untitled Note" on the way out. Changes only apply while editing.
    pub fn title_input(&mut self, input: TitleInput) {
        match (self.title_mode, input) {
            (TitleMode::Viewing, TitleInput::Click) => self.title_mode = TitleMode::Editing,
            (TitleMode::Editing, TitleInput::Change(title)) => self.buffer.title = title,
            (TitleMode::Editing, TitleInput::Blur | TitleInput::Enter) => {
                if self.buffer.title.trim().is_empty() {
                    self.buffer.title = UNTITLED_NOTE.to_string();
                }
                self.title_mode = TitleMode::Viewing;
            }
            _ => {}
        }
    }

    /// True when the buffer differs from the stored active note.
    pub fn has_uncommitted_edits(&self) -> bool {
        match self.active_note() {
            Some(note) => {
                note.title != self.buffer.title
                    || note.content != self.buffer.content
                    || note.attachments() != self.buffer.attachments.as_slice()
            }
            None => false,
        }
    }

    /// True while anything differs from the last saved document, whether it
    /// sits in the buffer or has been committed in memory.
    pub fn has_unsaved_changes(&self) -> bool {
        self.unsaved || self.has_uncommitted_edits()
    }

    /// Records that the committed project has been written to disk.
    pub fn mark_saved(&mut self) {
        self.unsaved = false;
    }

    // ---- Commit / switch protocol ----

    /// Writes the buffer back into the active note, stamping `updatedAt`.
    /// Returns false when there is no active note.
    pub fn commit(&mut self) -> bool {
        let Some(note) = self.project.notes.get_mut(self.active) else {
            return false;
        };
        if self.title_mode == TitleMode::Editing {
            self.title_mode = TitleMode::Viewing;
            if self.buffer.title.trim().is_empty() {
                self.buffer.title = UNTITLED_NOTE.to_string();
            }
        }
        note.title = self.buffer.title.clone();
        note.content = self.buffer.content.clone();
        if note.attachments.is_some() || !self.buffer.attachments.is_empty() {
            note.attachments = Some(self.buffer.attachments.clone());
        }
        note.updated_at = now();
        self.unsaved = true;
        true
    }

    /// Commits and stamps the project; returns the document to persist.
    pub fn commit_for_save(&mut self) -> &Project {
        self.commit();
        self.project.touch();
        &self.project
    }

    /// First half of a switch. `Ok(None)` when `index` is already active.
    pub fn begin_switch(&mut self, index: usize) -> Result<Option<PendingSwitch>, EditorError> {
        let len = self.project.notes.len();
        if index >= len {
            return Err(EditorError::NoteOutOfRange { index, len });
        }
        if index == self.active {
            return Ok(None);
        }
        self.commit_for_save();
        Ok(Some(PendingSwitch {
            from: self.active,
            to: index,
        }))
    }

    /// Second half of a switch, after the commit has been persisted.
    pub fn finish_switch(&mut self, pending: PendingSwitch) {
        if pending.from != self.active {
            log::warn!(
                "Stale note switch {} -> {} ignored (active is {})",
                pending.from,
                pending.to,
                self.active
            );
            return;
        }
        if let Some(note) = self.project.notes.get(pending.to) {
            self.active = pending.to;
            self.buffer = EditorBuffer::from_note(note);
            self.title_mode = TitleMode::Viewing;
        }
    }

    /// Commits the active note, saves the project, then activates `index`.
    /// On a failed save the session stays on the current note.
    pub async fn switch_to(&mut self, index: usize, store: &ProjectStore) -> Result<(), SessionError> {
        if let Some(pending) = self.begin_switch(index)? {
            store.save(&self.project).await?;
            self.unsaved = false;
            self.finish_switch(pending);
        }
        Ok(())
    }

    pub async fn commit_and_save(&mut self, store: &ProjectStore) -> Result<(), ProjectError> {
        let project = self.commit_for_save();
        store.save(project).await?;
        self.unsaved = false;
        Ok(())
    }

    /// Appends a fresh note and makes it active. The outgoing buffer is
    /// committed in memory first so its edits travel with the next save.
    pub fn create_note(&mut self) -> &Note {
        self.commit();
        let id = self.project.next_note_id();
        let title = format!("New Note {}", self.project.notes.len() + 1);
        self.project.notes.push(Note::new(id, title));
        self.unsaved = true;
        self.active = self.project.notes.len() - 1;
        self.buffer = EditorBuffer::from_note(&self.project.notes[self.active]);
        self.title_mode = TitleMode::Viewing;
        &self.project.notes[self.active]
    }

    /// Installs `project`. A different document starts at its first note; a
    /// refreshed copy of the current document keeps the active position and
    /// any uncommitted edits.
    pub fn adopt(&mut self, project: Project) {
        if project.path != self.project.path {
            *self = Self::new(project);
            return;
        }

        let previous_id = self.active_note().map(|n| n.id.clone());
        self.project = project;
        self.unsaved = false;
        if self.project.notes.is_empty() {
            self.active = 0;
            self.buffer = EditorBuffer::default();
            return;
        }
        self.active = self.active.min(self.project.notes.len() - 1);
        let same_note = previous_id.as_deref() == Some(self.project.notes[self.active].id.as_str());
        if !same_note {
            self.buffer = EditorBuffer::from_note(&self.project.notes[self.active]);
            self.title_mode = TitleMode::Viewing;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::testing::CountingFs;
    use crate::fs::LocalFs;
    use pretty_assertions::assert_eq;
    use std::path::PathBuf;
    use std::sync::Arc;

    fn two_note_project(path: PathBuf) -> Project {
        let mut project = Project::new("Two", "", path);
        project.notes.push(Note::new("1", "A").with_content("alpha"));
        project.notes.push(Note::new("2", "B").with_content("beta"));
        project
    }

    #[test]
    fn test_new_session_loads_first_note() {
        let session = NoteEditorSession::new(two_note_project(PathBuf::from("/x/Two.wan")));
        assert_eq!(session.active_index(), Some(0));
        assert_eq!(session.buffer().content, "alpha");
        assert_eq!(session.buffer().title, "A");
    }

    #[test]
    fn test_empty_project_has_no_active_note() {
        let mut session = NoteEditorSession::new(Project::new("E", "", PathBuf::from("/x/E.wan")));
        assert_eq!(session.active_index(), None);
        assert!(!session.commit());
    }

    #[tokio::test]
    async fn test_switch_commits_outgoing_note_to_disk() {
        let tmp = tempfile::tempdir().unwrap();
        let store = ProjectStore::new(Arc::new(LocalFs));
        let mut session = NoteEditorSession::new(two_note_project(tmp.path().join("Two.wan")));
        let before = session.notes()[0].updated_at;

        session.set_content("alpha, edited");
        session.switch_to(1, &store).await.unwrap();

        let on_disk = store.load(&tmp.path().join("Two.wan")).await.unwrap();
        assert_eq!(on_disk.notes[0].content, "alpha, edited");
        assert!(on_disk.notes[0].updated_at >= before);
        assert_eq!(session.active_index(), Some(1));
        assert_eq!(session.buffer().content, "beta");
        assert_eq!(session.buffer().title, "B");
    }

    #[tokio::test]
    async fn test_switch_to_active_note_is_noop() {
        let tmp = tempfile::tempdir().unwrap();
        let store = ProjectStore::new(Arc::new(LocalFs));
        let mut session = NoteEditorSession::new(two_note_project(tmp.path().join("Two.wan")));

        session.set_content("unsaved");
        session.switch_to(0, &store).await.unwrap();

        assert!(!tmp.path().join("Two.wan").exists());
        assert_eq!(session.buffer().content, "unsaved");
        assert!(session.has_uncommitted_edits());
    }

    #[tokio::test]
    async fn test_switch_out_of_range() {
        let store = ProjectStore::new(Arc::new(LocalFs));
        let mut session = NoteEditorSession::new(two_note_project(PathBuf::from("/x/Two.wan")));
        let err = session.switch_to(5, &store).await.unwrap_err();
        assert!(matches!(
            err,
            SessionError::Editor(EditorError::NoteOutOfRange { index: 5, len: 2 })
        ));
    }

    #[tokio::test]
    async fn test_failed_save_keeps_user_on_outgoing_note() {
        let tmp = tempfile::tempdir().unwrap();
        let fs = Arc::new(CountingFs::default());
        fs.set_fail_writes(true);
        let store = ProjectStore::new(fs.clone());
        let mut session = NoteEditorSession::new(two_note_project(tmp.path().join("Two.wan")));

        session.set_content("precious");
        assert!(session.switch_to(1, &store).await.is_err());
        assert_eq!(session.active_index(), Some(0));
        assert_eq!(session.buffer().content, "precious");
        assert_eq!(session.notes()[0].content, "precious");
        assert!(!session.has_uncommitted_edits());
        assert!(session.has_unsaved_changes());

        fs.set_fail_writes(false);
        session.switch_to(1, &store).await.unwrap();
        assert!(!session.has_unsaved_changes());
        let on_disk = store.load(&tmp.path().join("Two.wan")).await.unwrap();
        assert_eq!(on_disk.notes[0].content, "precious");
    }

    #[tokio::test]
    async fn test_commit_and_save_stamps_note_and_project() {
        let tmp = tempfile::tempdir().unwrap();
        let store = ProjectStore::new(Arc::new(LocalFs));
        let mut session = NoteEditorSession::new(two_note_project(tmp.path().join("Two.wan")));
        let project_before = session.project().updated_at;
        let note_before = session.notes()[0].updated_at;

        session.set_content("saved text");
        session.commit_and_save(&store).await.unwrap();

        assert!(session.project().updated_at >= project_before);
        assert!(session.notes()[0].updated_at >= note_before);
        assert!(!session.has_unsaved_changes());
        let on_disk = store.load(&session.project().path).await.unwrap();
        assert_eq!(on_disk, *session.project());
    }

    #[test]
    fn test_create_note_becomes_active() {
        let mut session = NoteEditorSession::new(two_note_project(PathBuf::from("/x/Two.wan")));
        session.set_content("kept");

        let note = session.create_note().clone();
        assert_eq!(note.id, "3");
        assert_eq!(note.title, "New Note 3");
        assert_eq!(note.content, "");
        assert_eq!(note.tags, Some(vec![]));
        assert_eq!(note.attachments, Some(vec![]));
        assert_eq!(session.active_index(), Some(2));
        assert_eq!(session.buffer().title, "New Note 3");
        // the outgoing edit was committed, not dropped
        assert_eq!(session.notes()[0].content, "kept");
        // nothing is left in the buffer, but the new note is not on disk yet
        assert!(!session.has_uncommitted_edits());
        assert!(session.has_unsaved_changes());

        session.mark_saved();
        assert!(!session.has_unsaved_changes());
    }

    #[test]
    fn test_create_first_note_in_empty_project() {
        let mut session = NoteEditorSession::new(Project::new("E", "", PathBuf::from("/x/E.wan")));
        assert_eq!(session.create_note().id, "1");
        assert_eq!(session.active_index(), Some(0));
        assert_eq!(session.buffer().title, "New Note 1");
    }

    #[test]
    fn test_title_state_machine() {
        let mut session = NoteEditorSession::new(two_note_project(PathBuf::from("/x/Two.wan")));

        session.title_input(TitleInput::Change("ignored".into()));
        assert_eq!(session.buffer().title, "A");

        session.title_input(TitleInput::Click);
        assert_eq!(session.title_mode(), TitleMode::Editing);
        session.title_input(TitleInput::Change("Packing list".into()));
        session.title_input(TitleInput::Enter);
        assert_eq!(session.title_mode(), TitleMode::Viewing);
        assert_eq!(session.buffer().title, "Packing list");

        session.title_input(TitleInput::Click);
        session.title_input(TitleInput::Change("   ".into()));
        session.title_input(TitleInput::Blur);
        assert_eq!(session.buffer().title, UNTITLED_NOTE);
        assert_eq!(session.title_mode(), TitleMode::Viewing);
    }

    #[test]
    fn test_insert_text_and_indent() {
        let mut session = NoteEditorSession::new(two_note_project(PathBuf::from("/x/Two.wan")));
        session.set_content("héllo world");

        let cursor = session.indent(0..0);
        assert_eq!(session.buffer().content, "  héllo world");
        assert_eq!(cursor, 2);

        let cursor = session.insert_text(8..13, "there");
        assert_eq!(session.buffer().content, "  héllo there");
        assert_eq!(cursor, 13);
    }

    #[tokio::test]
    async fn test_attach_inserts_reference_and_metadata() {
        let tmp = tempfile::tempdir().unwrap();
        let project_path = tmp.path().join("Two.wan");
        let resolver = crate::attachments::AttachmentResolver::new(Arc::new(LocalFs));
        let stored = resolver.store(b"png", "paste.png", &project_path).await.unwrap();

        let mut session = NoteEditorSession::new(two_note_project(project_path));
        session.attach(&stored, 5..5);
        assert_eq!(session.buffer().content, format!("alpha{}", stored.reference));

        session.commit();
        assert_eq!(session.notes()[0].attachments(), &[stored.attachment.clone()]);
    }

    #[test]
    fn test_adopt_same_project_keeps_position() {
        let path = PathBuf::from("/x/Two.wan");
        let mut session = NoteEditorSession::new(two_note_project(path.clone()));
        let pending = session.begin_switch(1).unwrap().unwrap();
        session.finish_switch(pending);
        session.set_content("typing...");

        let refreshed = session.project().clone();
        session.adopt(refreshed);
        assert_eq!(session.active_index(), Some(1));
        assert_eq!(session.buffer().content, "typing...");
    }

    #[test]
    fn test_adopt_new_project_resets_position() {
        let mut session = NoteEditorSession::new(two_note_project(PathBuf::from("/x/Two.wan")));
        let pending = session.begin_switch(1).unwrap().unwrap();
        session.finish_switch(pending);

        session.adopt(two_note_project(PathBuf::from("/y/Other.wan")));
        assert_eq!(session.active_index(), Some(0));
        assert_eq!(session.buffer().content, "alpha");
    }

    #[test]
    fn test_stale_pending_switch_is_ignored() {
        let mut session = NoteEditorSession::new(two_note_project(PathBuf::from("/x/Two.wan")));
        let stale = session.begin_switch(1).unwrap().unwrap();
        session.create_note();
        session.finish_switch(stale);
        assert_eq!(session.active_index(), Some(2));
        assert_eq!(session.buffer().title, "New Note 3");
    }
}
