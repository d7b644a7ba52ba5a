use crate::reconciler::{ReconcileError, Reconciler};
use disco_core::journal::events;
use disco_core::{keys, JournalEntry, ScanType, System};
use tracing::debug;

/// Journal events the reconciler cares about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JournalRoute {
    Jump,
    Scan,
    DiscoveryScan,
    BodySignals,
    SurfaceSignals,
    Codex,
    OrganicScan,
    SurfaceMapped,
    Location,
}

impl JournalRoute {
    pub fn classify(entry: &JournalEntry) -> Option<Self> {
        let route = match entry.event()? {
            events::FSD_JUMP | events::CARRIER_JUMP => Self::Jump,
            events::SCAN if ScanType::from_entry(entry).is_some() => Self::Scan,
            events::FSS_DISCOVERY_SCAN => Self::DiscoveryScan,
            events::FSS_BODY_SIGNALS => Self::BodySignals,
            events::SAA_SIGNALS_FOUND => Self::SurfaceSignals,
            events::CODEX_ENTRY => Self::Codex,
            events::SCAN_ORGANIC => Self::OrganicScan,
            events::SAA_SCAN_COMPLETE => Self::SurfaceMapped,
            events::LOCATION if entry.contains(keys::STAR_SYSTEM) => Self::Location,
            _ => return None,
        };
        Some(route)
    }
}

/// Outcome of routing one journal entry.
#[derive(Debug, Clone, PartialEq)]
pub enum Routed {
    /// The event was dispatched; carries the system to display, if any.
    Handled(Option<System>),
    Ignored,
}

impl Reconciler {
    /// Dispatches a journal entry to the matching reconcile operation.
    pub fn route(&mut self, entry: &JournalEntry) -> Result<Routed, ReconcileError> {
        let Some(route) = JournalRoute::classify(entry) else {
            return Ok(Routed::Ignored);
        };

        let system = match route {
            JournalRoute::Jump => self.upsert_system_on_jump(entry)?,
            JournalRoute::Scan => self.upsert_body_on_scan(entry)?,
            JournalRoute::DiscoveryScan => self.update_system_counts(entry)?,
            JournalRoute::BodySignals => self.upsert_signal(entry)?,
            JournalRoute::SurfaceSignals => {
                self.upsert_signal(entry)?;
                self.upsert_genus(entry)?
            }
            JournalRoute::Codex => self.upsert_codex(entry)?,
            JournalRoute::OrganicScan => self.upsert_genus(entry)?,
            JournalRoute::SurfaceMapped => self.mark_mapped(entry)?,
            JournalRoute::Location => match entry.str_field(keys::STAR_SYSTEM) {
                Some(name) => self.find_system_by_name(name)?,
                None => None,
            },
        };

        debug!(
            event = "journal_event_routed",
            route = ?route,
            system = system.as_ref().map(|system| system.name.as_str()),
        );
        Ok(Routed::Handled(system))
    }
}
