use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use tauri::menu::{Menu, MenuBuilder, MenuItemBuilder, SubmenuBuilder};
use tauri::{AppHandle, Emitter, Manager, State, WindowEvent, Wry};
use tauri_plugin_dialog::{
    DialogExt, MessageDialogButtons, MessageDialogKind, MessageDialogResult,
};
use tokio::sync::{oneshot, Mutex};

use crate::attachments::AttachmentResolver;
use crate::commands::{self, CommandId, MenuGroup, Platform};
use crate::editor::TitleInput;
use crate::fs::{FileSystem, LocalFs};
use crate::model::PROJECT_EXTENSION;
use crate::project::ProjectStore;
use crate::runtime::{Runtime, Shell};
use crate::session::{CloseChoice, Event, Notice, NoticeLevel};
use crate::settings::SettingsStore;
use crate::view::{UiAction, View};

/// Emitted whenever a background dispatch may have changed the view.
const VIEW_CHANGED: &str = "view-changed";

const PROJECT_FILTER_NAME: &str = "WanNote Project";
const SAVE_AND_CLOSE: &str = "Save and Close";
const CLOSE_WITHOUT_SAVING: &str = "Close without Saving";
const CANCEL: &str = "Cancel";

pub struct AppState {
    pub runtime: Mutex<Runtime>,
}

// ---- Shell backed by the dialog plugin ----

struct TauriShell {
    app: AppHandle,
}

#[async_trait]
impl Shell for TauriShell {
    async fn pick_project_file(&self) -> Option<PathBuf> {
        let (tx, rx) = oneshot::channel();
        self.app
            .dialog()
            .file()
            .add_filter(PROJECT_FILTER_NAME, &[PROJECT_EXTENSION])
            .pick_file(move |file| {
                let _ = tx.send(file);
            });
        rx.await.ok().flatten().and_then(|f| f.into_path().ok())
    }

    async fn notify(&self, notice: &Notice) {
        let kind = match notice.level {
            NoticeLevel::Info | NoticeLevel::Success => MessageDialogKind::Info,
            NoticeLevel::Warning => MessageDialogKind::Warning,
            NoticeLevel::Error => MessageDialogKind::Error,
        };
        self.app
            .dialog()
            .message(notice.message.clone())
            .title(notice.title.clone())
            .kind(kind)
            .show(|_| {});
    }

    async fn confirm_close(&self) -> CloseChoice {
        let (tx, rx) = oneshot::channel();
        self.app
            .dialog()
            .message("Do you want to save your changes before closing?")
            .title("Close project")
            .kind(MessageDialogKind::Warning)
            .buttons(MessageDialogButtons::YesNoCancelCustom(
                SAVE_AND_CLOSE.to_string(),
                CLOSE_WITHOUT_SAVING.to_string(),
                CANCEL.to_string(),
            ))
            .show_with_result(move |result| {
                let _ = tx.send(result);
            });

        match rx.await {
            Ok(MessageDialogResult::Yes) => CloseChoice::SaveAndClose,
            Ok(MessageDialogResult::No) => CloseChoice::CloseWithoutSaving,
            Ok(MessageDialogResult::Custom(label)) if label == SAVE_AND_CLOSE => {
                CloseChoice::SaveAndClose
            }
            Ok(MessageDialogResult::Custom(label)) if label == CLOSE_WITHOUT_SAVING => {
                CloseChoice::CloseWithoutSaving
            }
            _ => CloseChoice::Cancel,
        }
    }

    async fn exit(&self) {
        self.app.exit(0);
    }
}

// ---- Menu ----

fn build_menu(app: &AppHandle) -> tauri::Result<Menu<Wry>> {
    let mut file = SubmenuBuilder::new(app, "File");
    for spec in commands::in_menu(MenuGroup::File) {
        let mut item = MenuItemBuilder::with_id(spec.id.as_str(), spec.label);
        if let Some(accelerator) = spec.accelerator {
            item = item.accelerator(accelerator.menu_string());
        }
        file = file.item(&item.build(app)?);
    }

    let mut edit = SubmenuBuilder::new(app, "Edit");
    for spec in commands::in_menu(MenuGroup::Edit) {
        edit = match spec.id {
            CommandId::Undo => edit.undo(),
            CommandId::Redo => edit.redo(),
            CommandId::Cut => edit.cut(),
            CommandId::Copy => edit.copy(),
            CommandId::Paste => edit.paste(),
            CommandId::SelectAll => edit.select_all(),
            _ => edit,
        };
    }

    MenuBuilder::new(app)
        .item(&file.build()?)
        .item(&edit.build()?)
        .build()
}

/// Runs `event` off the UI thread and tells the webview to refresh.
fn spawn_dispatch(app: AppHandle, event: Event) {
    tauri::async_runtime::spawn(async move {
        let state = app.state::<AppState>();
        state.runtime.lock().await.dispatch(event).await;
        let _ = app.emit(VIEW_CHANGED, ());
    });
}

fn settings_store(app: &AppHandle) -> Result<SettingsStore> {
    match app.path().app_config_dir() {
        Ok(dir) => Ok(SettingsStore::new(dir)),
        Err(e) => {
            log::warn!("App config dir unavailable ({}), using platform default", e);
            SettingsStore::in_default_location()
                .ok_or_else(|| anyhow!("no configuration directory available"))
        }
    }
}

fn init_state(app: &AppHandle) -> Result<AppState> {
    let settings = settings_store(app)?;
    let fs: Arc<dyn FileSystem> = Arc::new(LocalFs);
    let runtime = Runtime::new(
        ProjectStore::new(fs.clone()).with_welcome_note(true),
        settings,
        AttachmentResolver::new(fs),
        Arc::new(TauriShell { app: app.clone() }),
    );
    Ok(AppState {
        runtime: Mutex::new(runtime),
    })
}

// TAURI COMMANDS

#[tauri::command]
async fn get_view(state: State<'_, AppState>) -> Result<View, String> {
    Ok(View::of(state.runtime.lock().await.controller()))
}

#[tauri::command]
async fn dispatch(action: UiAction, state: State<'_, AppState>) -> Result<View, String> {
    let mut runtime = state.runtime.lock().await;
    if let Some(event) = action.into_event(Platform::current()) {
        runtime.dispatch(event).await;
    }
    Ok(View::of(runtime.controller()))
}

#[tauri::command]
async fn edit_content(content: String, state: State<'_, AppState>) -> Result<(), String> {
    let mut runtime = state.runtime.lock().await;
    let editor = runtime
        .controller_mut()
        .editor_mut()
        .ok_or("No project open")?;
    editor.set_content(content);
    Ok(())
}

/// Tab key: inserts the indent over the selection and returns the new cursor.
#[tauri::command]
async fn indent(start: usize, end: usize, state: State<'_, AppState>) -> Result<usize, String> {
    let mut runtime = state.runtime.lock().await;
    let editor = runtime
        .controller_mut()
        .editor_mut()
        .ok_or("No project open")?;
    Ok(editor.indent(start..end))
}

#[tauri::command]
async fn title_input(input: TitleInput, state: State<'_, AppState>) -> Result<View, String> {
    let mut runtime = state.runtime.lock().await;
    if let Some(editor) = runtime.controller_mut().editor_mut() {
        editor.title_input(input);
    }
    Ok(View::of(runtime.controller()))
}

#[tauri::command]
async fn store_attachment(
    bytes: Vec<u8>,
    name: String,
    start: usize,
    end: usize,
    state: State<'_, AppState>,
) -> Result<Option<usize>, String> {
    let mut runtime = state.runtime.lock().await;
    runtime
        .paste_image(&bytes, &name, start..end)
        .await
        .map_err(|e| e.to_string())
}

#[tauri::command]
async fn render_note(state: State<'_, AppState>) -> Result<Option<String>, String> {
    Ok(state.runtime.lock().await.render_active_note().await)
}

#[cfg_attr(mobile, tauri::mobile_entry_point)]
pub fn run() {
    crate::init_logging();

    tauri::Builder::default()
        .plugin(tauri_plugin_opener::init())
        .plugin(tauri_plugin_fs::init())
        .plugin(tauri_plugin_dialog::init())
        .setup(|app| {
            let state = init_state(app.handle())?;
            app.manage(state);

            let menu = build_menu(app.handle())?;
            app.set_menu(menu)?;

            let handle = app.handle().clone();
            tauri::async_runtime::spawn(async move {
                let state = handle.state::<AppState>();
                state.runtime.lock().await.start().await;
                let _ = handle.emit(VIEW_CHANGED, ());
            });
            Ok(())
        })
        .on_menu_event(|app, event| {
            if let Ok(id) = event.id().as_ref().parse::<CommandId>() {
                spawn_dispatch(app.clone(), Event::Command(id));
            }
        })
        .on_window_event(|window, event| {
            if let WindowEvent::CloseRequested { api, .. } = event {
                api.prevent_close();
                spawn_dispatch(window.app_handle().clone(), Event::CloseRequested);
            }
        })
        .invoke_handler(tauri::generate_handler![
            get_view,
            dispatch,
            edit_content,
            indent,
            title_input,
            store_attachment,
            render_note,
        ])
        .run(tauri::generate_context!())
        .expect("error while running tauri application");
}
