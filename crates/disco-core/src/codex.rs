use crate::journal::{events, keys, JournalEntry};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CodexEntry {
    pub name: String,
    pub name_localised: String,
    pub category: Option<String>,
    pub category_localised: Option<String>,
    pub subcategory: Option<String>,
    pub subcategory_localised: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

impl CodexEntry {
    pub fn from_entry(entry: &JournalEntry) -> Option<Self> {
        let text = |key: &str| entry.str_field(key).map(ToString::to_string);
        Some(Self {
            name: entry.str_field(keys::NAME)?.to_string(),
            name_localised: entry
                .str_field(keys::NAME_LOCALISED)
                .unwrap_or_default()
                .to_string(),
            category: text(keys::CATEGORY),
            category_localised: text(keys::CATEGORY_LOCALISED),
            subcategory: text(keys::SUB_CATEGORY),
            subcategory_localised: text(keys::SUB_CATEGORY_LOCALISED),
            latitude: entry.f64_field(keys::LATITUDE),
            longitude: entry.f64_field(keys::LONGITUDE),
        })
    }

    pub fn display_name(&self) -> &str {
        if self.name_localised.is_empty() {
            &self.name
        } else {
            &self.name_localised
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Codexes {
    pub entries: Vec<CodexEntry>,
}

impl Codexes {
    pub fn apply_event(&mut self, entry: &JournalEntry) -> bool {
        if !entry.is_event(events::CODEX_ENTRY) {
            return false;
        }
        let Some(incoming) = CodexEntry::from_entry(entry) else {
            return false;
        };
        if self.contains(&incoming.name, &incoming.name_localised) {
            return false;
        }
        self.entries.push(incoming);
        true
    }

    pub fn contains(&self, name: &str, name_localised: &str) -> bool {
        self.entries
            .iter()
            .any(|known| known.name == name && known.name_localised == name_localised)
    }
}
