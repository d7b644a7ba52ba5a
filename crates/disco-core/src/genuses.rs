use crate::journal::{events, keys, JournalEntry};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrganicScanType {
    Log,
    Sample,
    Analyse,
}

impl OrganicScanType {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "Log" => Some(Self::Log),
            "Sample" => Some(Self::Sample),
            "Analyse" => Some(Self::Analyse),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenusScan {
    pub species: String,
    pub species_localised: String,
    pub variant: String,
    pub variant_localised: String,
    pub count: u32,
    pub done: bool,
}

impl GenusScan {
    pub fn advance(&mut self, stage: OrganicScanType) -> bool {
        if self.done {
            return false;
        }
        match stage {
            OrganicScanType::Log => {
                let changed = self.count != 1;
                self.count = 1;
                changed
            }
            OrganicScanType::Sample => {
                self.count = self.count.saturating_add(1);
                true
            }
            OrganicScanType::Analyse => {
                self.done = true;
                true
            }
        }
    }

    fn matches(&self, entry: &JournalEntry) -> bool {
        match entry.text_field(keys::VARIANT_LOCALISED) {
            Some(variant) => self.variant_localised == variant,
            None => {
                let species = entry.str_field(keys::SPECIES_LOCALISED).unwrap_or_default();
                self.species_localised == species
            }
        }
    }

    fn from_entry(entry: &JournalEntry) -> Self {
        let field = |key: &str| entry.str_field(key).unwrap_or_default().to_string();
        Self {
            species: field(keys::SPECIES),
            species_localised: field(keys::SPECIES_LOCALISED),
            variant: field(keys::VARIANT),
            variant_localised: field(keys::VARIANT_LOCALISED),
            count: 0,
            done: false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Genus {
    pub genus: String,
    pub genus_localised: String,
    pub scans: Vec<GenusScan>,
}

impl Genus {
    fn is(&self, genus: &str, genus_localised: &str) -> bool {
        self.genus == genus && self.genus_localised == genus_localised
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Genuses {
    pub entries: Vec<Genus>,
}

impl Genuses {
    pub fn apply_event(&mut self, entry: &JournalEntry) -> bool {
        match entry.array_field(keys::GENUSES) {
            Some(listed) if !listed.is_empty() => self.register(listed),
            _ if entry.is_event(events::SCAN_ORGANIC) => self.record_scan(entry),
            _ => false,
        }
    }

    pub fn genus(&self, genus: &str) -> Option<&Genus> {
        self.entries.iter().find(|known| known.genus == genus)
    }

    fn register(&mut self, listed: &[Value]) -> bool {
        let mut changed = false;
        for item in listed.iter().filter_map(Value::as_object) {
            let Some(genus) = item.get(keys::GENUS).and_then(Value::as_str) else {
                continue;
            };
            let genus_localised = item
                .get(keys::GENUS_LOCALISED)
                .and_then(Value::as_str)
                .unwrap_or_default();
            if self.entries.iter().any(|known| known.is(genus, genus_localised)) {
                continue;
            }
            self.entries.push(Genus {
                genus: genus.to_string(),
                genus_localised: genus_localised.to_string(),
                scans: Vec::new(),
            });
            changed = true;
        }
        changed
    }

    fn record_scan(&mut self, entry: &JournalEntry) -> bool {
        let Some(genus) = entry.str_field(keys::GENUS) else {
            return false;
        };
        let genus_localised = entry.str_field(keys::GENUS_LOCALISED).unwrap_or_default();

        let mut changed = false;
        let index = match self
            .entries
            .iter()
            .position(|known| known.is(genus, genus_localised))
        {
            Some(index) => index,
            None => {
                self.entries.push(Genus {
                    genus: genus.to_string(),
                    genus_localised: genus_localised.to_string(),
                    scans: Vec::new(),
                });
                changed = true;
                self.entries.len() - 1
            }
        };
        let scans = &mut self.entries[index].scans;

        let scan = match scans.iter().position(|scan| scan.matches(entry)) {
            Some(position) => &mut scans[position],
            None => {
                scans.push(GenusScan::from_entry(entry));
                changed = true;
                let last = scans.len() - 1;
                &mut scans[last]
            }
        };

        match entry.str_field(keys::SCAN_TYPE).and_then(OrganicScanType::parse) {
            Some(stage) => scan.advance(stage) || changed,
            None => changed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn entry(value: Value) -> JournalEntry {
        JournalEntry::from_value(value).expect("object entry")
    }

    fn organic(scan_type: &str, species: &str, variant: &str) -> JournalEntry {
        entry(json!({
            "event": "ScanOrganic",
            "ScanType": scan_type,
            "Genus": "$Codex_Ent_Bacterial_Genus_Name;",
            "Genus_Localised": "Bacterium",
            "Species": "$Codex_Ent_Bacterial_01_Name;",
            "Species_Localised": species,
            "Variant": if variant.is_empty() { "" } else { "$Codex_Ent_Bacterial_01_A_Name;" },
            "Variant_Localised": variant,
            "Body": 4
        }))
    }

    #[test]
    fn genus_list_is_deduplicated() {
        let listed = entry(json!({
            "event": "SAASignalsFound",
            "Genuses": [
                {"Genus": "$Codex_Ent_Bacterial_Genus_Name;", "Genus_Localised": "Bacterium"},
                {"Genus": "$Codex_Ent_Stratum_Genus_Name;", "Genus_Localised": "Stratum"}
            ]
        }));
        let mut genuses = Genuses::default();
        assert!(genuses.apply_event(&listed));
        assert!(!genuses.apply_event(&listed));
        assert_eq!(genuses.entries.len(), 2);
    }

    #[test]
    fn scan_progress_runs_log_sample_analyse() {
        let mut genuses = Genuses::default();
        assert!(genuses.apply_event(&organic("Log", "Bacterium Aurasus", "")));
        assert!(genuses.apply_event(&organic("Sample", "Bacterium Aurasus", "")));
        assert!(genuses.apply_event(&organic("Sample", "Bacterium Aurasus", "")));

        let genus = genuses.genus("$Codex_Ent_Bacterial_Genus_Name;").expect("genus");
        assert_eq!(genus.scans.len(), 1);
        assert_eq!(genus.scans[0].count, 3);
        assert!(!genus.scans[0].done);

        assert!(genuses.apply_event(&organic("Log", "Bacterium Aurasus", "")));
        let genus = genuses.genus("$Codex_Ent_Bacterial_Genus_Name;").expect("genus");
        assert_eq!(genus.scans[0].count, 1);

        assert!(genuses.apply_event(&organic("Analyse", "Bacterium Aurasus", "")));
        assert!(!genuses.apply_event(&organic("Sample", "Bacterium Aurasus", "")));
        assert!(!genuses.apply_event(&organic("Log", "Bacterium Aurasus", "")));

        let scan = &genuses.genus("$Codex_Ent_Bacterial_Genus_Name;").expect("genus").scans[0];
        assert!(scan.done);
        assert_eq!(scan.count, 1);
    }

    #[test]
    fn variants_track_progress_independently() {
        let mut genuses = Genuses::default();
        genuses.apply_event(&organic("Log", "Bacterium Aurasus", "Bacterium Aurasus - Teal"));
        genuses.apply_event(&organic("Log", "Bacterium Aurasus", "Bacterium Aurasus - Lime"));
        genuses.apply_event(&organic("Sample", "Bacterium Aurasus", "Bacterium Aurasus - Lime"));

        let genus = genuses.genus("$Codex_Ent_Bacterial_Genus_Name;").expect("genus");
        assert_eq!(genus.scans.len(), 2);
        assert_eq!(genus.scans[0].variant_localised, "Bacterium Aurasus - Teal");
        assert_eq!(genus.scans[0].count, 1);
        assert_eq!(genus.scans[1].count, 2);
    }

    #[test]
    fn replaying_a_log_without_species_keeps_one_record() {
        let log = entry(json!({
            "event": "ScanOrganic",
            "ScanType": "Log",
            "Genus": "$Codex_Ent_Bacterial_Genus_Name;",
            "Genus_Localised": "Bacterium",
            "Body": 4
        }));
        let mut genuses = Genuses::default();
        assert!(genuses.apply_event(&log));
        assert!(!genuses.apply_event(&log));

        let genus = genuses.genus("$Codex_Ent_Bacterial_Genus_Name;").expect("genus");
        assert_eq!(genus.scans.len(), 1);
        assert_eq!(genus.scans[0].species_localised, "");
        assert_eq!(genus.scans[0].count, 1);
    }

    #[test]
    fn unrelated_events_change_nothing() {
        let mut genuses = Genuses::default();
        assert!(!genuses.apply_event(&entry(json!({"event": "SAASignalsFound", "Genuses": []}))));
        assert!(!genuses.apply_event(&entry(json!({"event": "ScanOrganic", "ScanType": "Log"}))));
        assert!(genuses.entries.is_empty());
    }
}
