//! Shared UI surface bindings.
//!
//! Widgets themselves are rendered elsewhere; the core only writes text into
//! known elements of known boxes.

use std::collections::HashMap;

use crate::types::UiConfig;

/// Element names the core writes into.
pub mod elements {
    pub const PLAYER_NAME: &str = "player-name";
    pub const SCENE_LABEL: &str = "scene-label";
    pub const PLAYER_STATS: &str = "player-stats-container";
}

/// One UI region: element name → current text content.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UiBox {
    elements: HashMap<String, String>,
}

impl UiBox {
    pub fn with_elements(names: &[&str]) -> Self {
        Self {
            elements: names
                .iter()
                .map(|name| (name.to_string(), String::new()))
                .collect(),
        }
    }

    pub fn element(&self, name: &str) -> Option<&str> {
        self.elements.get(name).map(String::as_str)
    }

    /// Write `text` into `name` if the element exists. Returns whether it did.
    pub fn set_text(&mut self, name: &str, text: impl Into<String>) -> bool {
        match self.elements.get_mut(name) {
            Some(slot) => {
                *slot = text.into();
                true
            }
            None => false,
        }
    }
}

/// The process-wide UI layer, created by the first loading stage.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UiSurface {
    pub right_box: Option<UiBox>,
    pub scene_label: Option<UiBox>,
    pub player_stats: Option<UiBox>,
}

impl UiSurface {
    pub fn from_config(config: &UiConfig) -> Self {
        Self {
            right_box: config
                .right_box
                .then(|| UiBox::with_elements(&[elements::PLAYER_NAME])),
            scene_label: config
                .scene_label
                .then(|| UiBox::with_elements(&[elements::SCENE_LABEL])),
            player_stats: config
                .player_stats
                .then(|| UiBox::with_elements(&[elements::PLAYER_STATS])),
        }
    }

    pub fn player_name(&self) -> Option<&str> {
        self.right_box.as_ref()?.element(elements::PLAYER_NAME)
    }

    pub fn scene_title(&self) -> Option<&str> {
        self.scene_label.as_ref()?.element(elements::SCENE_LABEL)
    }

    pub fn stats_text(&self) -> Option<&str> {
        self.player_stats.as_ref()?.element(elements::PLAYER_STATS)
    }
}

/// Plain-text stats panel: one `key: value` line per stat, keys sorted.
pub fn render_stats(stats: &serde_json::Value) -> String {
    match stats {
        serde_json::Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            keys.iter()
                .map(|k| match &map[k.as_str()] {
                    serde_json::Value::String(s) => format!("{}: {}", k, s),
                    other => format!("{}: {}", k, other),
                })
                .collect::<Vec<_>>()
                .join("\n")
        }
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    }
}
