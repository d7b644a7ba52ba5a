use crate::journal::{keys, JournalEntry};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalCategory {
    Biological,
    Geological,
    HumanMade,
    Other,
}

impl SignalCategory {
    pub fn classify(signal_type: &str, type_localised: Option<&str>) -> Self {
        let labels = [Some(signal_type), type_localised];
        let mentions = |needle: &str| labels.iter().flatten().any(|label| label.contains(needle));
        if mentions("Biological") {
            Self::Biological
        } else if mentions("Geological") {
            Self::Geological
        } else if mentions("Human") {
            Self::HumanMade
        } else {
            Self::Other
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signal {
    pub signal_type: String,
    pub type_localised: Option<String>,
    pub count: u32,
}

impl Signal {
    pub fn category(&self) -> SignalCategory {
        SignalCategory::classify(&self.signal_type, self.type_localised.as_deref())
    }

    fn from_value(value: &Value) -> Option<Self> {
        let fields = value.as_object()?;
        let signal_type = fields.get(keys::TYPE)?.as_str()?.to_string();
        let type_localised = fields
            .get(keys::TYPE_LOCALISED)
            .and_then(Value::as_str)
            .map(ToString::to_string);
        let count = fields
            .get(keys::COUNT)
            .and_then(Value::as_u64)
            .and_then(|count| u32::try_from(count).ok())
            .unwrap_or(0);
        Some(Self {
            signal_type,
            type_localised,
            count,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signals {
    pub entries: Vec<Signal>,
}

impl Signals {
    pub fn apply_event(&mut self, entry: &JournalEntry) -> bool {
        let Some(incoming) = entry.array_field(keys::SIGNALS) else {
            return false;
        };

        let mut changed = false;
        for signal in incoming.iter().filter_map(Signal::from_value) {
            match self
                .entries
                .iter_mut()
                .find(|known| known.signal_type == signal.signal_type)
            {
                Some(known) => {
                    if known.count != signal.count {
                        known.count = signal.count;
                        changed = true;
                    }
                }
                None => {
                    self.entries.push(signal);
                    changed = true;
                }
            }
        }
        changed
    }

    pub fn count_for(&self, category: SignalCategory) -> u32 {
        self.entries
            .iter()
            .find(|signal| signal.category() == category)
            .map_or(0, |signal| signal.count)
    }

    pub fn count_bio_signals(&self) -> u32 {
        self.count_for(SignalCategory::Biological)
    }

    pub fn count_geo_signals(&self) -> u32 {
        self.count_for(SignalCategory::Geological)
    }

    pub fn count_human_signals(&self) -> u32 {
        self.count_for(SignalCategory::HumanMade)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn entry(value: Value) -> JournalEntry {
        JournalEntry::from_value(value).expect("object entry")
    }

    #[test]
    fn merge_updates_counts_in_place_and_appends_new_types() {
        let mut signals = Signals::default();
        assert!(signals.apply_event(&entry(json!({
            "event": "FSSBodySignals",
            "Signals": [
                {"Type": "$SAA_SignalType_Biological;", "Type_Localised": "Biological", "Count": 3},
                {"Type": "$SAA_SignalType_Geological;", "Type_Localised": "Geological", "Count": 2}
            ]
        }))));
        assert_eq!(signals.entries.len(), 2);

        assert!(!signals.apply_event(&entry(json!({
            "Signals": [{"Type": "$SAA_SignalType_Biological;", "Count": 3}]
        }))));

        assert!(signals.apply_event(&entry(json!({
            "Signals": [
                {"Type": "$SAA_SignalType_Biological;", "Count": 5},
                {"Type": "$SAA_SignalType_Human;", "Type_Localised": "Human", "Count": 1}
            ]
        }))));
        assert_eq!(signals.entries.len(), 3);
        assert_eq!(signals.count_bio_signals(), 5);
        assert_eq!(signals.count_geo_signals(), 2);
        assert_eq!(signals.count_human_signals(), 1);
    }

    #[test]
    fn plain_type_names_classify_without_localisation() {
        let mut signals = Signals::default();
        signals.apply_event(&entry(json!({
            "Signals": [{"Type": "Biological", "Count": 3}]
        })));
        assert_eq!(signals.count_bio_signals(), 3);
        assert_eq!(signals.count_geo_signals(), 0);
        assert_eq!(
            SignalCategory::classify("$SAA_SignalType_Thargoid;", Some("Thargoid")),
            SignalCategory::Other
        );
    }

    #[test]
    fn entries_without_type_are_skipped() {
        let mut signals = Signals::default();
        assert!(!signals.apply_event(&entry(json!({"Signals": [{"Count": 4}, "junk"]}))));
        assert!(!signals.apply_event(&entry(json!({"event": "Scan"}))));
        assert!(signals.entries.is_empty());
    }
}
