pub mod body;
pub mod codex;
pub mod genuses;
pub mod journal;
pub mod merge;
pub mod signals;
pub mod system;

pub use body::{Body, BodyFeatures, ScanType};
pub use codex::{CodexEntry, Codexes};
pub use genuses::{Genus, GenusScan, Genuses, OrganicScanType};
pub use journal::{keys, parse_journal_timestamp, JournalEntry, ParentRef, TimestampError};
pub use signals::{Signal, SignalCategory, Signals};
pub use system::{StarPos, System, SystemFeatures};
