/// Centralized keybinding definitions.
/// The help overlay, status bar, and key handler all read from here.

#[derive(Debug, Clone)]
pub struct KeyBinding {
    pub key: &'static str,
    pub description: &'static str,
    pub category: KeyCategory,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum KeyCategory {
    Legend,
    Session,
    System,
}

impl KeyCategory {
    pub const ALL: [KeyCategory; 3] = [KeyCategory::Legend, KeyCategory::Session, KeyCategory::System];

    pub fn title(&self) -> &'static str {
        match self {
            KeyCategory::Legend => "Legend",
            KeyCategory::Session => "Session",
            KeyCategory::System => "System",
        }
    }
}

pub fn get_all_keybindings() -> Vec<KeyBinding> {
    vec![
        KeyBinding {
            key: "↑/k",
            description: "Select previous interface",
            category: KeyCategory::Legend,
        },
        KeyBinding {
            key: "↓/j",
            description: "Select next interface",
            category: KeyCategory::Legend,
        },
        KeyBinding {
            key: "Space/Enter",
            description: "Show/hide selected interface",
            category: KeyCategory::Legend,
        },
        KeyBinding {
            key: "a",
            description: "Show all interfaces",
            category: KeyCategory::Legend,
        },
        KeyBinding {
            key: "r",
            description: "Reset session (clear history and legend)",
            category: KeyCategory::Session,
        },
        KeyBinding {
            key: "h/?",
            description: "Toggle this help",
            category: KeyCategory::System,
        },
        KeyBinding {
            key: "q/Esc",
            description: "Quit (or close help if open)",
            category: KeyCategory::System,
        },
        KeyBinding {
            key: "Ctrl+C",
            description: "Force quit (always exits)",
            category: KeyCategory::System,
        },
    ]
}

/// The most common bindings, for the status bar
pub fn get_status_bar_keybindings() -> Vec<(&'static str, &'static str)> {
    vec![
        ("↑↓", "Select"),
        ("Space", "Show/Hide"),
        ("a", "All"),
        ("r", "Reset"),
        ("h", "Help"),
        ("q", "Quit"),
    ]
}
