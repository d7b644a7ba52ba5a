use crate::reconciler::{ReconcileError, Reconciler};
use crate::router::Routed;
use chrono::Utc;
use disco_core::{JournalEntry, System};
use disco_storage::{JournalCheckpoint, StorageError};
use std::fs;
use std::io::BufRead;
use std::path::Path;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum ImportError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
    #[error("reconcile error: {0}")]
    Reconcile(#[from] ReconcileError),
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ImportReport {
    pub lines: usize,
    pub handled: usize,
    pub ignored: usize,
    pub skipped_corrupt_lines: usize,
    pub deferred_partial_line: bool,
    pub reset_due_to_truncation: bool,
    pub cursor: u64,
}

/// Feeds newline-delimited journal events through a [`Reconciler`].
///
/// `on_system` is called with the 1-based line number for every routed event
/// that produced a system.
#[derive(Debug, Default, Clone, Copy)]
pub struct JournalImporter;

impl JournalImporter {
    pub fn new() -> Self {
        Self
    }

    pub fn import_reader<R, F>(
        &self,
        reconciler: &mut Reconciler,
        mut reader: R,
        mut on_system: F,
    ) -> Result<ImportReport, ImportError>
    where
        R: BufRead,
        F: FnMut(usize, &System),
    {
        let mut report = ImportReport::default();
        let mut buf = Vec::new();
        loop {
            buf.clear();
            let read = reader.read_until(b'\n', &mut buf)?;
            if read == 0 {
                break;
            }
            report.lines += 1;
            report.cursor += read as u64;
            let mut line = buf.as_slice();
            if let Some(stripped) = line.strip_suffix(b"\n") {
                line = stripped.strip_suffix(b"\r").unwrap_or(stripped);
            }
            self.process_line(reconciler, line, &mut report, &mut on_system)?;
        }
        Ok(report)
    }

    /// Incremental ingestion: resumes from the stored byte cursor for `path`,
    /// leaves a trailing unterminated line for the next call and starts over
    /// when the file shrank below the cursor.
    pub fn ingest_file<F>(
        &self,
        reconciler: &mut Reconciler,
        path: impl AsRef<Path>,
        mut on_system: F,
    ) -> Result<ImportReport, ImportError>
    where
        F: FnMut(usize, &System),
    {
        let path = path.as_ref();
        let journal_path = path.to_string_lossy().into_owned();
        let bytes = fs::read(path)?;
        let checkpoint = reconciler.store().checkpoint(&journal_path)?;

        let mut report = ImportReport::default();
        let mut start_cursor = checkpoint
            .as_ref()
            .map_or(0_u64, |checkpoint| checkpoint.cursor);

        if start_cursor as usize > bytes.len() {
            start_cursor = 0;
            report.reset_due_to_truncation = true;
        }

        let mut consumed: usize = 0;
        let pending = &bytes[start_cursor as usize..];

        while consumed < pending.len() {
            let remaining = &pending[consumed..];
            let Some(newline_index) = remaining.iter().position(|byte| *byte == b'\n') else {
                report.deferred_partial_line = !remaining.is_empty();
                break;
            };

            let line = &remaining[..newline_index];
            consumed += newline_index + 1;
            report.lines += 1;
            self.process_line(reconciler, line, &mut report, &mut on_system)?;
        }

        report.cursor = start_cursor + consumed as u64;
        reconciler.store().upsert_checkpoint(&JournalCheckpoint {
            journal_path: journal_path.clone(),
            cursor: report.cursor,
            updated_at: Utc::now(),
        })?;

        info!(
            event = "journal_ingested",
            journal = %journal_path,
            lines = report.lines,
            handled = report.handled,
            skipped = report.skipped_corrupt_lines,
            cursor = report.cursor,
        );
        Ok(report)
    }

    fn process_line<F>(
        &self,
        reconciler: &mut Reconciler,
        line: &[u8],
        report: &mut ImportReport,
        on_system: &mut F,
    ) -> Result<(), ImportError>
    where
        F: FnMut(usize, &System),
    {
        if line.iter().all(u8::is_ascii_whitespace) {
            return Ok(());
        }

        let entry: JournalEntry = match serde_json::from_slice(line) {
            Ok(entry) => entry,
            Err(err) => {
                warn!(event = "journal_line_corrupt", line = report.lines, error = %err);
                report.skipped_corrupt_lines += 1;
                return Ok(());
            }
        };

        match reconciler.route(&entry)? {
            Routed::Handled(system) => {
                report.handled += 1;
                if let Some(system) = system {
                    on_system(report.lines, &system);
                }
            }
            Routed::Ignored => report.ignored += 1,
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use disco_storage::DiscoStore;
    use std::io::{Cursor, Write};
    use tempfile::NamedTempFile;

    const JUMP: &str = r#"{"timestamp":"2023-01-01T00:00:00Z","event":"FSDJump","StarSystem":"Test","SystemAddress":1000,"StarPos":[1.0,2.0,3.0]}"#;
    const SCAN: &str = r#"{"timestamp":"2023-01-01T00:01:00Z","event":"Scan","ScanType":"Detailed","SystemAddress":1000,"BodyID":1,"BodyName":"Test A","StarType":"K"}"#;
    const DOCKED: &str = r#"{"timestamp":"2023-01-01T00:02:00Z","event":"Docked"}"#;

    fn reconciler() -> Reconciler {
        Reconciler::new(DiscoStore::open_in_memory().expect("open db"))
    }

    #[test]
    fn reader_import_reports_every_line() {
        let mut reconciler = reconciler();
        let input = format!("{JUMP}\n{{\"bad_json\"\n\n{SCAN}\n{DOCKED}\n");
        let mut seen = Vec::new();

        let report = JournalImporter::new()
            .import_reader(&mut reconciler, Cursor::new(input), |line, system| {
                seen.push((line, system.name.clone()));
            })
            .expect("import");

        assert_eq!(report.lines, 5);
        assert_eq!(report.handled, 2);
        assert_eq!(report.ignored, 1);
        assert_eq!(report.skipped_corrupt_lines, 1);
        assert_eq!(seen, vec![(1, "Test".to_string()), (4, "Test".to_string())]);
        assert_eq!(reconciler.store().body_count(1000).expect("count"), 1);
    }

    #[test]
    fn reader_import_skips_lines_that_are_not_utf8() {
        let mut reconciler = reconciler();
        let mut input = Vec::new();
        input.extend_from_slice(JUMP.as_bytes());
        input.extend_from_slice(b"\n{\"event\":\"\xff\xfe\"}\r\n");
        input.extend_from_slice(SCAN.as_bytes());
        input.extend_from_slice(b"\r\n");

        let report = JournalImporter::new()
            .import_reader(&mut reconciler, Cursor::new(input.clone()), |_, _| {})
            .expect("import");

        assert_eq!(report.lines, 3);
        assert_eq!(report.handled, 2);
        assert_eq!(report.skipped_corrupt_lines, 1);
        assert_eq!(report.cursor, input.len() as u64);
        assert_eq!(reconciler.store().body_count(1000).expect("count"), 1);
    }

    #[test]
    fn ingest_is_incremental_and_defers_partial_lines() {
        let mut reconciler = reconciler();
        let mut log = NamedTempFile::new().expect("temp log");
        writeln!(log, "{JUMP}").expect("write jump");
        write!(log, "{SCAN}").expect("write partial scan");
        log.flush().expect("flush");

        let importer = JournalImporter::new();
        let first = importer
            .ingest_file(&mut reconciler, log.path(), |_, _| {})
            .expect("ingest first");
        assert_eq!(first.handled, 1);
        assert!(first.deferred_partial_line);
        assert_eq!(first.cursor, JUMP.len() as u64 + 1);
        assert_eq!(reconciler.store().body_count(1000).expect("count"), 0);

        writeln!(log).expect("finish partial line");
        log.flush().expect("flush");

        let second = importer
            .ingest_file(&mut reconciler, log.path(), |_, _| {})
            .expect("ingest second");
        assert_eq!(second.lines, 1);
        assert_eq!(second.handled, 1);
        assert!(!second.deferred_partial_line);
        assert_eq!(reconciler.store().body_count(1000).expect("count"), 1);

        let third = importer
            .ingest_file(&mut reconciler, log.path(), |_, _| {})
            .expect("ingest third");
        assert_eq!(third.lines, 0);
    }

    #[test]
    fn ingest_restarts_when_the_file_is_truncated() {
        let mut reconciler = reconciler();
        let mut log = NamedTempFile::new().expect("temp log");
        writeln!(log, "{JUMP}").expect("write");
        writeln!(log, "{SCAN}").expect("write");
        log.flush().expect("flush");

        let importer = JournalImporter::new();
        importer
            .ingest_file(&mut reconciler, log.path(), |_, _| {})
            .expect("ingest first");

        fs::write(log.path(), format!("{DOCKED}\n")).expect("truncate and rewrite");
        let second = importer
            .ingest_file(&mut reconciler, log.path(), |_, _| {})
            .expect("ingest second");
        assert!(second.reset_due_to_truncation);
        assert_eq!(second.ignored, 1);
        assert_eq!(second.cursor, DOCKED.len() as u64 + 1);
    }
}
