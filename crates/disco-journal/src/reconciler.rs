use disco_core::journal::events;
use disco_core::merge::is_current;
use disco_core::{keys, Body, JournalEntry, ScanType, System};
use disco_storage::{DiscoStore, StorageError};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}

enum Gate {
    Missing,
    Stale(System),
    Current(System),
}

impl Gate {
    fn into_unchanged(self) -> Option<System> {
        match self {
            Gate::Missing => None,
            Gate::Stale(system) | Gate::Current(system) => Some(system),
        }
    }
}

/// Applies journal events to the stored System aggregates.
///
/// Callers must serialize calls; every operation loads the aggregate, merges
/// the event and commits before returning. A `None` result means the event
/// lacked the identity it needs or referenced an unknown system or body.
pub struct Reconciler {
    store: DiscoStore,
}

impl Reconciler {
    pub fn new(store: DiscoStore) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &DiscoStore {
        &self.store
    }

    pub fn close(&mut self) -> Result<(), ReconcileError> {
        Ok(self.store.close()?)
    }

    pub fn find_system_by_name(&self, name: &str) -> Result<Option<System>, ReconcileError> {
        Ok(self.store.find_system_by_name(name)?)
    }

    pub fn find_system_by_address(
        &self,
        system_address: u64,
    ) -> Result<Option<System>, ReconcileError> {
        Ok(self.store.find_system_by_address(system_address)?)
    }

    fn commit(&mut self, system: &mut System) -> Result<(), ReconcileError> {
        self.store.save_system(system)?;
        Ok(())
    }

    fn gate(
        &self,
        system_address: u64,
        entry: &JournalEntry,
        operation: &'static str,
    ) -> Result<Gate, ReconcileError> {
        let Some(system) = self.store.find_system_by_address(system_address)? else {
            return Ok(Gate::Missing);
        };
        if is_current(system.last_update, entry.timestamp()) {
            return Ok(Gate::Current(system));
        }
        debug!(
            event = "stale_journal_event",
            operation,
            system_address,
            stored = system.last_update,
            incoming = ?entry.timestamp(),
        );
        Ok(Gate::Stale(system))
    }

    pub fn upsert_system_on_jump(
        &mut self,
        entry: &JournalEntry,
    ) -> Result<Option<System>, ReconcileError> {
        let Some(system_address) = entry.system_address() else {
            return Ok(None);
        };

        let Some(mut system) = self.store.find_system_by_address(system_address)? else {
            let mut system = System::new(system_address);
            system.apply_event(entry);
            system.features.apply_event(entry);
            if entry.str_field(keys::BODY).is_some() {
                let mut star = Body::new(entry.body_id().unwrap_or(0));
                star.apply_event(entry);
                star.features.apply_event(entry);
                system.bodies.push(star);
            }
            self.commit(&mut system)?;
            debug!(event = "system_created", system_address, name = %system.name);
            return Ok(Some(system));
        };

        match entry.timestamp() {
            Some(timestamp) if is_current(system.last_update, Some(timestamp)) => {
                system.features.apply_event(entry);
                system.advance_timestamp(timestamp);
                self.commit(&mut system)?;
            }
            incoming => debug!(
                event = "stale_journal_event",
                operation = "jump",
                system_address,
                stored = system.last_update,
                incoming = ?incoming,
            ),
        }
        Ok(Some(system))
    }

    /// Body counts from a discovery scan; not timestamp-gated.
    pub fn update_system_counts(
        &mut self,
        entry: &JournalEntry,
    ) -> Result<Option<System>, ReconcileError> {
        let Some(system_address) = entry.system_address() else {
            return Ok(None);
        };
        let Some(mut system) = self.store.find_system_by_address(system_address)? else {
            return Ok(None);
        };
        system.apply_counts(entry);
        self.commit(&mut system)?;
        Ok(Some(system))
    }

    pub fn upsert_body_on_scan(
        &mut self,
        entry: &JournalEntry,
    ) -> Result<Option<System>, ReconcileError> {
        let (Some(system_address), Some(body_id)) = (entry.system_address(), entry.body_id())
        else {
            return Ok(None);
        };
        let mut system = match self.gate(system_address, entry, "scan")? {
            Gate::Current(system) => system,
            other => return Ok(other.into_unchanged()),
        };

        let (body, created) = system.ensure_body(body_id);
        body.apply_event(entry);
        body.features.apply_event(entry);
        let discovery = entry.is_event(events::SCAN)
            && ScanType::from_entry(entry).is_some_and(ScanType::is_discovery);
        if discovery {
            body.features.mark_discovered_first();
        }
        let placeholders = materialize_parents(&mut system, entry);

        self.commit(&mut system)?;
        debug!(
            event = "body_scanned",
            system_address,
            body_id,
            created,
            placeholders,
        );
        Ok(Some(system))
    }

    /// Surface mapping complete; any other event returns the system untouched.
    pub fn mark_mapped(&mut self, entry: &JournalEntry) -> Result<Option<System>, ReconcileError> {
        let (Some(system_address), Some(body_id)) = (entry.system_address(), entry.body_id())
        else {
            return Ok(None);
        };
        if !entry.is_event(events::SAA_SCAN_COMPLETE) {
            return self.find_system_by_address(system_address);
        }
        let mut system = match self.gate(system_address, entry, "mapped")? {
            Gate::Current(system) => system,
            other => return Ok(other.into_unchanged()),
        };

        if let Some(body) = system.body_mut(body_id) {
            body.features.mark_mapped_first();
            self.commit(&mut system)?;
        }
        Ok(Some(system))
    }

    /// Merges detected signals, creating the body first if no scan has named it yet.
    pub fn upsert_signal(&mut self, entry: &JournalEntry) -> Result<Option<System>, ReconcileError> {
        let (Some(system_address), Some(body_id)) = (entry.system_address(), entry.body_id())
        else {
            return Ok(None);
        };
        let mut system = match self.gate(system_address, entry, "signals")? {
            Gate::Current(system) => system,
            other => return Ok(other.into_unchanged()),
        };

        if !system.has_body(body_id) {
            let (body, _) = system.ensure_body(body_id);
            body.apply_event(entry);
            self.commit(&mut system)?;
        }

        let changed = system
            .body_mut(body_id)
            .is_some_and(|body| body.signals.apply_event(entry));
        if changed {
            self.advance_and_commit(&mut system, entry)?;
        }
        Ok(Some(system))
    }

    /// Genus list or organic scan progress. Unknown bodies are not created.
    pub fn upsert_genus(&mut self, entry: &JournalEntry) -> Result<Option<System>, ReconcileError> {
        let Some(system_address) = entry.system_address() else {
            return Ok(None);
        };
        // Organic scans carry the body id under `Body`.
        let Some(body_id) = entry.body_id().or_else(|| entry.u32_field(keys::BODY)) else {
            return Ok(None);
        };
        let mut system = match self.gate(system_address, entry, "genus")? {
            Gate::Current(system) => system,
            other => return Ok(other.into_unchanged()),
        };

        let Some(body) = system.body_mut(body_id) else {
            return Ok(None);
        };
        if body.genuses.apply_event(entry) {
            self.advance_and_commit(&mut system, entry)?;
        }
        Ok(Some(system))
    }

    pub fn upsert_codex(&mut self, entry: &JournalEntry) -> Result<Option<System>, ReconcileError> {
        let (Some(system_address), Some(body_id)) = (entry.system_address(), entry.body_id())
        else {
            return Ok(None);
        };
        let mut system = match self.gate(system_address, entry, "codex")? {
            Gate::Current(system) => system,
            other => return Ok(other.into_unchanged()),
        };

        let Some(body) = system.body_mut(body_id) else {
            return Ok(None);
        };
        if body.codexes.apply_event(entry) {
            self.advance_and_commit(&mut system, entry)?;
        }
        Ok(Some(system))
    }

    fn advance_and_commit(
        &mut self,
        system: &mut System,
        entry: &JournalEntry,
    ) -> Result<(), ReconcileError> {
        if let Some(timestamp) = entry.timestamp() {
            system.advance_timestamp(timestamp);
        }
        self.commit(system)
    }
}

/// Adds an unscanned placeholder for every `Parents` ancestor the system does
/// not know yet. Each placeholder's parent is the next ancestor in the chain.
pub fn materialize_parents(system: &mut System, entry: &JournalEntry) -> usize {
    let parents = entry.parents();
    let mut created = 0;
    for (index, parent) in parents.iter().enumerate() {
        if system.has_body(parent.body_id) {
            continue;
        }
        let grandparent = parents.get(index + 1).map_or(0, |next| next.body_id);
        system
            .bodies
            .push(Body::placeholder(parent.body_id, grandparent, &parent.kind));
        created += 1;
    }
    created
}
