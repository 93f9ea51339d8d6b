use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::error::UnknownCommand;

// ---- Command ids ----

/// Stable command identifier, also used as the menu item id and on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandId {
    OpenProject,
    NewProject,
    NewNote,
    Save,
    Quit,
    Undo,
    Redo,
    Cut,
    Copy,
    Paste,
    SelectAll,
}

impl CommandId {
    pub fn as_str(&self) -> &'static str {
        match self {
            CommandId::OpenProject => "open-project",
            CommandId::NewProject => "new-project",
            CommandId::NewNote => "new-note",
            CommandId::Save => "save",
            CommandId::Quit => "quit",
            CommandId::Undo => "undo",
            CommandId::Redo => "redo",
            CommandId::Cut => "cut",
            CommandId::Copy => "copy",
            CommandId::Paste => "paste",
            CommandId::SelectAll => "select-all",
        }
    }

}

impl FromStr for CommandId {
    type Err = UnknownCommand;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        COMMANDS
            .iter()
            .map(|c| c.id)
            .find(|id| id.as_str() == s)
            .ok_or_else(|| UnknownCommand(s.to_string()))
    }
}

impl fmt::Display for CommandId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for CommandId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for CommandId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

// ---- Platform-aware accelerators ----

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    MacOs,
    Other,
}

impl Platform {
    pub fn current() -> Self {
        if cfg!(target_os = "macos") {
            Platform::MacOs
        } else {
            Platform::Other
        }
    }
}

/// Modifier state of a key press as reported by the view layer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyModifiers {
    #[serde(default)]
    pub meta: bool,
    #[serde(default)]
    pub ctrl: bool,
    #[serde(default)]
    pub shift: bool,
    #[serde(default)]
    pub alt: bool,
}

/// `Primary+<key>`, where Primary is Cmd on macOS and Ctrl elsewhere.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Accelerator {
    pub key: char,
}

impl Accelerator {
    const fn primary(key: char) -> Self {
        Self { key }
    }

    /// Accelerator string understood by the Tauri menu builder.
    pub fn menu_string(&self) -> String {
        format!("CmdOrCtrl+{}", self.key)
    }

    pub fn label(&self, platform: Platform) -> String {
        match platform {
            Platform::MacOs => format!("Cmd+{}", self.key),
            Platform::Other => format!("Ctrl+{}", self.key),
        }
    }

    pub fn matches(&self, key: &str, mods: KeyModifiers, platform: Platform) -> bool {
        let primary = match platform {
            Platform::MacOs => mods.meta && !mods.ctrl,
            Platform::Other => mods.ctrl && !mods.meta,
        };
        let mut chars = key.chars();
        let single = match (chars.next(), chars.next()) {
            (Some(c), None) => c,
            _ => return false,
        };
        primary && !mods.alt && !mods.shift && single.eq_ignore_ascii_case(&self.key)
    }
}

// ---- Command table ----

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuGroup {
    File,
    Edit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandAction {
    /// Routed to the session controller.
    Dispatch,
    /// Handled by the native text-editing surface.
    Native,
}

#[derive(Debug, Clone, Copy)]
pub struct CommandSpec {
    pub id: CommandId,
    pub label: &'static str,
    pub menu: MenuGroup,
    pub accelerator: Option<Accelerator>,
    pub action: CommandAction,
}

const fn dispatch(
    id: CommandId,
    label: &'static str,
    accelerator: Option<Accelerator>,
) -> CommandSpec {
    CommandSpec {
        id,
        label,
        menu: MenuGroup::File,
        accelerator,
        action: CommandAction::Dispatch,
    }
}

const fn native(id: CommandId, label: &'static str) -> CommandSpec {
    CommandSpec {
        id,
        label,
        menu: MenuGroup::Edit,
        accelerator: None,
        action: CommandAction::Native,
    }
}

pub static COMMANDS: &[CommandSpec] = &[
    dispatch(CommandId::OpenProject, "Open existing project", None),
    dispatch(CommandId::NewProject, "Create new project", None),
    dispatch(CommandId::NewNote, "New note", None),
    dispatch(CommandId::Save, "Save", Some(Accelerator::primary('S'))),
    dispatch(CommandId::Quit, "Quit", Some(Accelerator::primary('Q'))),
    native(CommandId::Undo, "Undo"),
    native(CommandId::Redo, "Redo"),
    native(CommandId::Cut, "Cut"),
    native(CommandId::Copy, "Copy"),
    native(CommandId::Paste, "Paste"),
    native(CommandId::SelectAll, "Select All"),
];

pub fn lookup(id: CommandId) -> Option<&'static CommandSpec> {
    COMMANDS.iter().find(|c| c.id == id)
}

pub fn in_menu(group: MenuGroup) -> impl Iterator<Item = &'static CommandSpec> {
    COMMANDS.iter().filter(move |c| c.menu == group)
}

/// Command bound to a key press, if any.
pub fn match_shortcut(key: &str, mods: KeyModifiers, platform: Platform) -> Option<CommandId> {
    COMMANDS
        .iter()
        .find(|c| {
            c.accelerator
                .map_or(false, |acc| acc.matches(key, mods, platform))
        })
        .map(|c| c.id)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cmd() -> KeyModifiers {
        KeyModifiers {
            meta: true,
            ..Default::default()
        }
    }

    fn ctrl() -> KeyModifiers {
        KeyModifiers {
            ctrl: true,
            ..Default::default()
        }
    }

    #[test]
    fn test_save_shortcut_is_platform_aware() {
        assert_eq!(match_shortcut("s", cmd(), Platform::MacOs), Some(CommandId::Save));
        assert_eq!(match_shortcut("s", ctrl(), Platform::MacOs), None);
        assert_eq!(match_shortcut("S", ctrl(), Platform::Other), Some(CommandId::Save));
        assert_eq!(match_shortcut("s", cmd(), Platform::Other), None);
    }

    #[test]
    fn test_quit_shortcut() {
        assert_eq!(match_shortcut("q", cmd(), Platform::MacOs), Some(CommandId::Quit));
        assert_eq!(match_shortcut("q", ctrl(), Platform::Other), Some(CommandId::Quit));
    }

    #[test]
    fn test_unbound_keys() {
        assert_eq!(match_shortcut("s", KeyModifiers::default(), Platform::Other), None);
        let shifted = KeyModifiers {
            shift: true,
            ..ctrl()
        };
        assert_eq!(match_shortcut("s", shifted, Platform::Other), None);
        assert_eq!(match_shortcut("Enter", ctrl(), Platform::Other), None);
    }

    #[test]
    fn test_command_id_roundtrip() {
        for spec in COMMANDS {
            assert_eq!(spec.id.as_str().parse::<CommandId>().unwrap(), spec.id);
            let json = serde_json::to_string(&spec.id).unwrap();
            assert_eq!(json, format!("\"{}\"", spec.id));
            assert_eq!(serde_json::from_str::<CommandId>(&json).unwrap(), spec.id);
        }
        assert_eq!(
            "format-disk".parse::<CommandId>(),
            Err(UnknownCommand("format-disk".to_string()))
        );
        assert!(serde_json::from_str::<CommandId>("\"format-disk\"").is_err());
    }

    #[test]
    fn test_menu_groups() {
        let file: Vec<_> = in_menu(MenuGroup::File).map(|c| c.id).collect();
        assert!(file.contains(&CommandId::OpenProject));
        assert!(file.contains(&CommandId::NewProject));
        assert!(in_menu(MenuGroup::Edit).all(|c| c.action == CommandAction::Native));
        assert_eq!(
            lookup(CommandId::Save).and_then(|c| c.accelerator).map(|a| a.menu_string()),
            Some("CmdOrCtrl+S".to_string())
        );
        assert_eq!(
            lookup(CommandId::Quit).unwrap().accelerator.unwrap().label(Platform::MacOs),
            "Cmd+Q"
        );
    }
}
