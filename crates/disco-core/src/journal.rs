use chrono::{DateTime, NaiveDateTime};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

pub const JOURNAL_TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

pub mod keys {
    pub const EVENT: &str = "event";
    pub const TIMESTAMP: &str = "timestamp";

    pub const SYSTEM_ADDRESS: &str = "SystemAddress";
    pub const STAR_SYSTEM: &str = "StarSystem";
    pub const STAR_POS: &str = "StarPos";
    pub const BODY_COUNT: &str = "BodyCount";
    pub const NON_BODY_COUNT: &str = "NonBodyCount";
    pub const SYSTEM_ALLEGIANCE: &str = "SystemAllegiance";
    pub const SYSTEM_SECURITY_LOCALISED: &str = "SystemSecurity_Localised";
    pub const POPULATION: &str = "Population";

    pub const BODY: &str = "Body";
    pub const BODY_ID: &str = "BodyID";
    pub const BODY_NAME: &str = "BodyName";
    pub const BODY_TYPE: &str = "BodyType";
    pub const PARENTS: &str = "Parents";
    pub const SCAN_TYPE: &str = "ScanType";

    pub const ABSOLUTE_MAGNITUDE: &str = "AbsoluteMagnitude";
    pub const ATMOSPHERE: &str = "Atmosphere";
    pub const ATMOSPHERE_TYPE: &str = "AtmosphereType";
    pub const AXIAL_TILT: &str = "AxialTilt";
    pub const DISTANCE_FROM_ARRIVAL_LS: &str = "DistanceFromArrivalLS";
    pub const ECCENTRICITY: &str = "Eccentricity";
    pub const LANDABLE: &str = "Landable";
    pub const LUMINOSITY: &str = "Luminosity";
    pub const MASS_EM: &str = "MassEM";
    pub const ORBITAL_INCLINATION: &str = "OrbitalInclination";
    pub const ORBITAL_PERIOD: &str = "OrbitalPeriod";
    pub const PERIAPSIS: &str = "Periapsis";
    pub const PLANET_CLASS: &str = "PlanetClass";
    pub const RADIUS: &str = "Radius";
    pub const ROTATION_PERIOD: &str = "RotationPeriod";
    pub const SEMI_MAJOR_AXIS: &str = "SemiMajorAxis";
    pub const STAR_TYPE: &str = "StarType";
    pub const STELLAR_MASS: &str = "StellarMass";
    pub const SUBCLASS: &str = "Subclass";
    pub const SURFACE_GRAVITY: &str = "SurfaceGravity";
    pub const SURFACE_PRESSURE: &str = "SurfacePressure";
    pub const SURFACE_TEMPERATURE: &str = "SurfaceTemperature";
    pub const TERRAFORM_STATE: &str = "TerraformState";
    pub const VOLCANISM: &str = "Volcanism";
    pub const WAS_DISCOVERED: &str = "WasDiscovered";
    pub const WAS_MAPPED: &str = "WasMapped";

    pub const SIGNALS: &str = "Signals";
    pub const TYPE: &str = "Type";
    pub const TYPE_LOCALISED: &str = "Type_Localised";
    pub const COUNT: &str = "Count";

    pub const GENUSES: &str = "Genuses";
    pub const GENUS: &str = "Genus";
    pub const GENUS_LOCALISED: &str = "Genus_Localised";
    pub const SPECIES: &str = "Species";
    pub const SPECIES_LOCALISED: &str = "Species_Localised";
    pub const VARIANT: &str = "Variant";
    pub const VARIANT_LOCALISED: &str = "Variant_Localised";

    pub const NAME: &str = "Name";
    pub const NAME_LOCALISED: &str = "Name_Localised";
    pub const CATEGORY: &str = "Category";
    pub const CATEGORY_LOCALISED: &str = "Category_Localised";
    pub const SUB_CATEGORY: &str = "SubCategory";
    pub const SUB_CATEGORY_LOCALISED: &str = "SubCategory_Localised";
    pub const LATITUDE: &str = "Latitude";
    pub const LONGITUDE: &str = "Longitude";
}

pub mod events {
    pub const FSD_JUMP: &str = "FSDJump";
    pub const CARRIER_JUMP: &str = "CarrierJump";
    pub const LOCATION: &str = "Location";
    pub const SCAN: &str = "Scan";
    pub const FSS_DISCOVERY_SCAN: &str = "FSSDiscoveryScan";
    pub const FSS_BODY_SIGNALS: &str = "FSSBodySignals";
    pub const SAA_SIGNALS_FOUND: &str = "SAASignalsFound";
    pub const SAA_SCAN_COMPLETE: &str = "SAAScanComplete";
    pub const SCAN_ORGANIC: &str = "ScanOrganic";
    pub const CODEX_ENTRY: &str = "CodexEntry";
}

#[derive(Debug, Error)]
#[error("invalid journal timestamp {value:?}: {reason}")]
pub struct TimestampError {
    pub value: String,
    pub reason: String,
}

pub fn parse_journal_timestamp(value: &str) -> Result<i64, TimestampError> {
    if let Ok(naive) = NaiveDateTime::parse_from_str(value, JOURNAL_TIMESTAMP_FORMAT) {
        return Ok(naive.and_utc().timestamp());
    }

    DateTime::parse_from_rfc3339(value)
        .map(|datetime| datetime.timestamp())
        .map_err(|err| TimestampError {
            value: value.to_string(),
            reason: err.to_string(),
        })
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParentRef {
    pub kind: String,
    pub body_id: u32,
}

/// A single journal line: a string-keyed mapping with an `event` discriminator.
///
/// Accessors are typed membership checks: a key holding a value of the wrong
/// JSON type reads as absent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JournalEntry(Map<String, Value>);

impl JournalEntry {
    pub fn new(fields: Map<String, Value>) -> Self {
        Self(fields)
    }

    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(fields) => Some(Self(fields)),
            _ => None,
        }
    }

    pub fn parse_line(line: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(line)
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn event(&self) -> Option<&str> {
        self.str_field(keys::EVENT)
    }

    pub fn is_event(&self, name: &str) -> bool {
        self.event() == Some(name)
    }

    pub fn str_field(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    pub fn text_field(&self, key: &str) -> Option<&str> {
        self.str_field(key).filter(|value| !value.is_empty())
    }

    pub fn i64_field(&self, key: &str) -> Option<i64> {
        self.0.get(key).and_then(Value::as_i64)
    }

    pub fn u64_field(&self, key: &str) -> Option<u64> {
        self.0.get(key).and_then(Value::as_u64)
    }

    pub fn u32_field(&self, key: &str) -> Option<u32> {
        self.u64_field(key).and_then(|value| u32::try_from(value).ok())
    }

    pub fn f64_field(&self, key: &str) -> Option<f64> {
        self.0.get(key).and_then(Value::as_f64)
    }

    pub fn bool_field(&self, key: &str) -> Option<bool> {
        self.0.get(key).and_then(Value::as_bool)
    }

    pub fn array_field(&self, key: &str) -> Option<&Vec<Value>> {
        self.0.get(key).and_then(Value::as_array)
    }

    pub fn system_address(&self) -> Option<u64> {
        self.u64_field(keys::SYSTEM_ADDRESS)
    }

    pub fn body_id(&self) -> Option<u32> {
        self.u32_field(keys::BODY_ID)
    }

    pub fn timestamp(&self) -> Option<i64> {
        self.str_field(keys::TIMESTAMP)
            .and_then(|value| parse_journal_timestamp(value).ok())
    }

    pub fn parents(&self) -> Vec<ParentRef> {
        let Some(chain) = self.array_field(keys::PARENTS) else {
            return Vec::new();
        };

        chain
            .iter()
            .filter_map(Value::as_object)
            .flat_map(|link| link.iter())
            .filter_map(|(kind, body_id)| {
                let body_id = body_id.as_u64().and_then(|id| u32::try_from(id).ok())?;
                Some(ParentRef {
                    kind: kind.clone(),
                    body_id,
                })
            })
            .collect()
    }
}

impl From<Map<String, Value>> for JournalEntry {
    fn from(fields: Map<String, Value>) -> Self {
        Self(fields)
    }
}
