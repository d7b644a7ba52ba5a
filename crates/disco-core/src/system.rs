use crate::body::Body;
use crate::journal::{keys, JournalEntry};
use crate::merge::{advance_watermark, sticky_count, sticky_text};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct StarPos {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl StarPos {
    pub fn from_entry(entry: &JournalEntry) -> Option<Self> {
        let coords = entry.array_field(keys::STAR_POS)?;
        let [x, y, z] = coords.as_slice() else {
            return None;
        };
        Some(Self {
            x: x.as_f64()?,
            y: y.as_f64()?,
            z: z.as_f64()?,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SystemFeatures {
    pub allegiance: Option<String>,
    pub security: Option<String>,
    pub population: u64,
}

impl SystemFeatures {
    pub fn apply_event(&mut self, entry: &JournalEntry) -> bool {
        let before = self.clone();
        self.allegiance = sticky_text(
            self.allegiance.take(),
            entry.str_field(keys::SYSTEM_ALLEGIANCE),
        );
        self.security = sticky_text(
            self.security.take(),
            entry.str_field(keys::SYSTEM_SECURITY_LOCALISED),
        );
        self.population = sticky_count(self.population, entry.u64_field(keys::POPULATION));
        *self != before
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct System {
    pub id: Option<i64>,
    pub system_address: u64,
    pub name: String,
    pub position: StarPos,
    pub body_count: u32,
    pub non_body_count: u32,
    /// Epoch seconds of the newest event applied; never moves backward.
    pub last_update: i64,
    pub features: SystemFeatures,
    pub bodies: Vec<Body>,
}

impl System {
    pub fn new(system_address: u64) -> Self {
        Self {
            system_address,
            ..Self::default()
        }
    }

    pub fn apply_event(&mut self, entry: &JournalEntry) -> bool {
        let mut changed = false;
        if let Some(address) = entry.system_address() {
            changed |= self.system_address != address;
            self.system_address = address;
        }
        if let Some(name) = entry.str_field(keys::STAR_SYSTEM) {
            changed |= self.name != name;
            self.name = name.to_string();
        }
        if let Some(timestamp) = entry.timestamp() {
            changed |= self.advance_timestamp(timestamp);
        }
        if let Some(position) = StarPos::from_entry(entry) {
            changed |= self.position != position;
            self.position = position;
        }
        changed
    }

    pub fn apply_counts(&mut self, entry: &JournalEntry) -> bool {
        let mut changed = false;
        if let Some(count) = entry.u32_field(keys::BODY_COUNT) {
            changed |= self.body_count != count;
            self.body_count = count;
        }
        if let Some(count) = entry.u32_field(keys::NON_BODY_COUNT) {
            changed |= self.non_body_count != count;
            self.non_body_count = count;
        }
        changed
    }

    pub fn advance_timestamp(&mut self, timestamp: i64) -> bool {
        let next = advance_watermark(self.last_update, timestamp);
        let changed = next != self.last_update;
        self.last_update = next;
        changed
    }

    pub fn has_body(&self, body_id: u32) -> bool {
        self.bodies.iter().any(|body| body.body_id == body_id)
    }

    pub fn body(&self, body_id: u32) -> Option<&Body> {
        self.bodies.iter().find(|body| body.body_id == body_id)
    }

    pub fn body_mut(&mut self, body_id: u32) -> Option<&mut Body> {
        self.bodies.iter_mut().find(|body| body.body_id == body_id)
    }

    pub fn ensure_body(&mut self, body_id: u32) -> (&mut Body, bool) {
        match self.bodies.iter().position(|body| body.body_id == body_id) {
            Some(index) => (&mut self.bodies[index], false),
            None => {
                self.bodies.push(Body::new(body_id));
                let index = self.bodies.len() - 1;
                (&mut self.bodies[index], true)
            }
        }
    }

    pub fn scanned_body_count(&self) -> usize {
        self.bodies
            .iter()
            .filter(|body| {
                body.features.star_type.is_some()
                    || body.features.body_type.as_deref() == Some("Planet")
            })
            .count()
    }

    pub fn progress(&self) -> String {
        format!("{}/{}", self.scanned_body_count(), self.body_count)
    }
}
