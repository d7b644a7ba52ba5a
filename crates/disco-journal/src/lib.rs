//! Turns journal events into persisted discovery records.

mod importer;
mod reconciler;
mod router;

pub use importer::{ImportError, ImportReport, JournalImporter};
pub use reconciler::{materialize_parents, ReconcileError, Reconciler};
pub use router::{JournalRoute, Routed};
