use crate::codex::Codexes;
use crate::genuses::Genuses;
use crate::journal::{keys, JournalEntry};
use crate::merge::{assign, latch, latch_first};
use crate::signals::Signals;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanType {
    AutoScan,
    Basic,
    Detailed,
    NavBeaconDetail,
}

impl ScanType {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "AutoScan" => Some(Self::AutoScan),
            "Basic" => Some(Self::Basic),
            "Detailed" => Some(Self::Detailed),
            "NavBeaconDetail" => Some(Self::NavBeaconDetail),
            _ => None,
        }
    }

    pub fn from_entry(entry: &JournalEntry) -> Option<Self> {
        entry.str_field(keys::SCAN_TYPE).and_then(Self::parse)
    }

    /// Scans performed by the local commander; nav beacon data is not a discovery.
    pub fn is_discovery(self) -> bool {
        matches!(self, Self::AutoScan | Self::Basic | Self::Detailed)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BodyFeatures {
    pub absolute_magnitude: Option<f64>,
    pub atmosphere: Option<String>,
    pub atmosphere_type: Option<String>,
    pub axial_tilt: Option<f64>,
    pub body_type: Option<String>,
    pub discovered: bool,
    pub discovered_first: bool,
    pub distance_ls: Option<f64>,
    pub eccentricity: Option<f64>,
    pub landable: Option<bool>,
    pub luminosity: Option<String>,
    pub mapped: bool,
    pub mapped_first: bool,
    pub mass_em: Option<f64>,
    pub orbital_inclination: Option<f64>,
    pub orbital_period: Option<f64>,
    pub periapsis: Option<f64>,
    pub planet_class: Option<String>,
    pub radius: Option<f64>,
    pub rotation_period: Option<f64>,
    pub semi_major_axis: Option<f64>,
    pub star_type: Option<String>,
    pub stellar_mass: Option<f64>,
    pub subclass: Option<i64>,
    pub surface_gravity: Option<f64>,
    pub surface_pressure: Option<f64>,
    pub surface_temperature: Option<f64>,
    pub terraform_state: Option<String>,
    pub volcanism: Option<String>,
}

fn text(entry: &JournalEntry, key: &str) -> Option<String> {
    entry.str_field(key).map(ToString::to_string)
}

impl BodyFeatures {
    pub fn apply_event(&mut self, entry: &JournalEntry) -> bool {
        let mut changed = false;

        changed |= assign(
            &mut self.absolute_magnitude,
            entry.f64_field(keys::ABSOLUTE_MAGNITUDE),
        );
        changed |= assign(&mut self.atmosphere, text(entry, keys::ATMOSPHERE));
        changed |= assign(&mut self.atmosphere_type, text(entry, keys::ATMOSPHERE_TYPE));
        changed |= assign(&mut self.axial_tilt, entry.f64_field(keys::AXIAL_TILT));

        if let Some(body_type) = entry.str_field(keys::BODY_TYPE) {
            changed |= assign(&mut self.body_type, Some(body_type.to_string()));
        } else if let Some(planet_class) = entry.str_field(keys::PLANET_CLASS) {
            changed |= assign(&mut self.body_type, Some("Planet".to_string()));
            changed |= assign(&mut self.planet_class, Some(planet_class.to_string()));
        } else if entry.contains(keys::STAR_TYPE) {
            changed |= assign(&mut self.body_type, Some("Star".to_string()));
        } else if entry
            .str_field(keys::BODY_NAME)
            .is_some_and(|name| name.contains("Cluster"))
        {
            changed |= assign(&mut self.body_type, Some("Cluster".to_string()));
        }

        if !self.discovered {
            self.discovered = latch(false, entry.bool_field(keys::WAS_DISCOVERED));
            changed |= self.discovered;
        }
        if !self.mapped && latch(false, entry.bool_field(keys::WAS_MAPPED)) {
            self.mapped = true;
            self.discovered = true;
            changed = true;
        }

        changed |= assign(
            &mut self.distance_ls,
            entry.f64_field(keys::DISTANCE_FROM_ARRIVAL_LS),
        );
        changed |= assign(&mut self.eccentricity, entry.f64_field(keys::ECCENTRICITY));
        changed |= assign(&mut self.landable, entry.bool_field(keys::LANDABLE));
        changed |= assign(&mut self.luminosity, text(entry, keys::LUMINOSITY));
        changed |= assign(&mut self.mass_em, entry.f64_field(keys::MASS_EM));
        changed |= assign(
            &mut self.orbital_inclination,
            entry.f64_field(keys::ORBITAL_INCLINATION),
        );
        changed |= assign(&mut self.orbital_period, entry.f64_field(keys::ORBITAL_PERIOD));
        changed |= assign(&mut self.periapsis, entry.f64_field(keys::PERIAPSIS));
        changed |= assign(&mut self.radius, entry.f64_field(keys::RADIUS));
        changed |= assign(
            &mut self.rotation_period,
            entry.f64_field(keys::ROTATION_PERIOD),
        );
        changed |= assign(
            &mut self.semi_major_axis,
            entry.f64_field(keys::SEMI_MAJOR_AXIS),
        );
        changed |= assign(&mut self.star_type, text(entry, keys::STAR_TYPE));
        changed |= assign(&mut self.stellar_mass, entry.f64_field(keys::STELLAR_MASS));
        changed |= assign(&mut self.subclass, entry.i64_field(keys::SUBCLASS));
        changed |= assign(
            &mut self.surface_gravity,
            entry.f64_field(keys::SURFACE_GRAVITY),
        );
        changed |= assign(
            &mut self.surface_pressure,
            entry.f64_field(keys::SURFACE_PRESSURE),
        );
        changed |= assign(
            &mut self.surface_temperature,
            entry.f64_field(keys::SURFACE_TEMPERATURE),
        );
        changed |= assign(&mut self.terraform_state, text(entry, keys::TERRAFORM_STATE));
        changed |= assign(&mut self.volcanism, text(entry, keys::VOLCANISM));

        changed
    }

    pub fn mark_discovered_first(&mut self) -> bool {
        let before = (self.discovered, self.discovered_first);
        let (discovered, first) = latch_first(self.discovered, self.discovered_first);
        self.discovered = discovered;
        self.discovered_first = first;
        before != (discovered, first)
    }

    pub fn mark_mapped_first(&mut self) -> bool {
        let before = (self.mapped, self.mapped_first, self.discovered);
        let (mapped, first) = latch_first(self.mapped, self.mapped_first);
        self.mapped = mapped;
        self.mapped_first = first;
        self.discovered = true;
        before != (self.mapped, self.mapped_first, self.discovered)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Body {
    pub id: Option<i64>,
    pub body_id: u32,
    /// Nearest enclosing body; 0 is the system barycentre.
    pub parent_id: u32,
    pub name: String,
    pub features: BodyFeatures,
    pub signals: Signals,
    pub genuses: Genuses,
    pub codexes: Codexes,
}

impl Body {
    pub fn new(body_id: u32) -> Self {
        Self {
            body_id,
            ..Self::default()
        }
    }

    pub fn placeholder(body_id: u32, parent_id: u32, body_type: &str) -> Self {
        let mut body = Self::new(body_id);
        body.parent_id = parent_id;
        body.features.body_type = Some(body_type.to_string());
        body
    }

    pub fn apply_event(&mut self, entry: &JournalEntry) -> bool {
        let mut changed = false;
        // `Body` is a name on jumps but a numeric id on organic scans.
        for key in [keys::BODY, keys::BODY_NAME] {
            if let Some(name) = entry.str_field(key) {
                changed |= self.name != name;
                self.name = name.to_string();
            }
        }
        if let Some(body_id) = entry.body_id() {
            changed |= self.body_id != body_id;
            self.body_id = body_id;
        }
        if let Some(parent) = entry.parents().first() {
            changed |= self.parent_id != parent.body_id;
            self.parent_id = parent.body_id;
        }
        changed
    }

    pub fn is_placeholder(&self) -> bool {
        self.name.is_empty()
    }
}
