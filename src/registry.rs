// Stable identity, color, and visibility for every interface seen this session

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;

/// 24-bit display color
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rgb(pub u8, pub u8, pub u8);

impl Rgb {
    /// Blend toward black, used where the surface has no alpha channel
    pub fn scaled(&self, factor: f64) -> Rgb {
        let f = factor.clamp(0.0, 1.0);
        Rgb(
            (self.0 as f64 * f).round() as u8,
            (self.1 as f64 * f).round() as u8,
            (self.2 as f64 * f).round() as u8,
        )
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}", self.0, self.1, self.2)
    }
}

impl From<Rgb> for ratatui::style::Color {
    fn from(c: Rgb) -> Self {
        ratatui::style::Color::Rgb(c.0, c.1, c.2)
    }
}

/// Ordered set of visually distinct series colors
pub const PALETTE: [Rgb; 8] = [
    Rgb(0x3b, 0x82, 0xf6), // blue
    Rgb(0x10, 0xb9, 0x81), // green
    Rgb(0xf5, 0x9e, 0x0b), // amber
    Rgb(0xef, 0x44, 0x44), // red
    Rgb(0x8b, 0x5c, 0xf6), // violet
    Rgb(0x06, 0xb6, 0xd4), // cyan
    Rgb(0xec, 0x48, 0x99), // pink
    Rgb(0x84, 0xcc, 0x16), // lime
];

#[derive(Debug, Clone, PartialEq)]
pub struct SeriesEntry {
    pub name: String,
    pub color: Rgb,
    pub hidden: bool,
    /// Has at least one contribution in the current window
    pub active: bool,
}

/// Row of the legend handed to the host
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LegendEntry {
    pub name: String,
    pub color: Rgb,
    pub hidden: bool,
}

/// Append-only name -> color mapping in first-seen order
#[derive(Debug, Clone, Default)]
pub struct SeriesRegistry {
    entries: Vec<SeriesEntry>,
    index: HashMap<String, usize>,
    /// Names that start hidden when first seen (restored from config)
    preset_hidden: HashSet<String>,
}

impl SeriesRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_hidden<I, S>(hidden: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            preset_hidden: hidden.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// Return the interface's color, registering it on first sight
    pub fn ensure(&mut self, name: &str) -> Rgb {
        if let Some(&i) = self.index.get(name) {
            return self.entries[i].color;
        }

        let color = PALETTE[self.entries.len() % PALETTE.len()];
        let hidden = self.preset_hidden.contains(name);
        log::debug!("Registered series {} with color {}", name, color);

        self.index.insert(name.to_string(), self.entries.len());
        self.entries.push(SeriesEntry {
            name: name.to_string(),
            color,
            hidden,
            active: true,
        });
        color
    }

    /// Flip visibility. Returns the new hidden state, or `None` for unknown names.
    pub fn toggle(&mut self, name: &str) -> Option<bool> {
        let &i = self.index.get(name)?;
        let entry = &mut self.entries[i];
        entry.hidden = !entry.hidden;

        if entry.hidden {
            self.preset_hidden.insert(name.to_string());
        } else {
            self.preset_hidden.remove(name);
        }
        Some(entry.hidden)
    }

    /// Make every series visible
    pub fn show_all(&mut self) {
        for entry in &mut self.entries {
            entry.hidden = false;
        }
        self.preset_hidden.clear();
    }

    pub fn is_hidden(&self, name: &str) -> bool {
        self.index
            .get(name)
            .map(|&i| self.entries[i].hidden)
            .unwrap_or(false)
    }

    pub fn color(&self, name: &str) -> Option<Rgb> {
        self.index.get(name).map(|&i| self.entries[i].color)
    }

    /// Mark which entries still contribute to the window. Colors are never touched.
    pub fn sync_active(&mut self, in_window: &HashSet<&str>) {
        for entry in &mut self.entries {
            let active = in_window.contains(entry.name.as_str());
            if entry.active && !active {
                log::debug!("Series {} left the window", entry.name);
            }
            entry.active = active;
        }
    }

    /// All entries ever registered, first-seen order
    pub fn entries(&self) -> &[SeriesEntry] {
        &self.entries
    }

    /// Entries to draw: active and not hidden, first-seen order
    pub fn visible(&self) -> impl Iterator<Item = &SeriesEntry> {
        self.entries.iter().filter(|e| e.active && !e.hidden)
    }

    pub fn legend(&self) -> Vec<LegendEntry> {
        self.entries
            .iter()
            .filter(|e| e.active)
            .map(|e| LegendEntry {
                name: e.name.clone(),
                color: e.color,
                hidden: e.hidden,
            })
            .collect()
    }

    /// Names currently hidden, including restored names not yet seen
    pub fn hidden_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.preset_hidden.iter().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Forget every entry. Hidden preferences survive so a remount keeps them.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.index.clear();
    }
}
