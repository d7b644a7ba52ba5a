use crate::config::PluginConfig;
use crate::PluginError;
use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{sync_channel, SyncSender};
use std::sync::{OnceLock, RwLock};
use std::thread::{self, JoinHandle};
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{fmt, reload, EnvFilter, Registry};

pub type FilterHandle = reload::Handle<EnvFilter, Registry>;

static NEXT_WORKER_ID: AtomicU64 = AtomicU64::new(1);
static ACTIVE_WRITER: RwLock<Option<(u64, ChannelWriter)>> = RwLock::new(None);
// Set once per process: the global subscriber cannot be replaced.
static GLOBAL_FILTER: OnceLock<Option<FilterHandle>> = OnceLock::new();

#[cfg(test)]
pub(crate) static GLOBAL_LOGGING_TEST_LOCK: std::sync::Mutex<()> = std::sync::Mutex::new(());

pub enum LogMessage {
    Line(Vec<u8>),
    Shutdown,
}

pub struct LogWorker {
    id: u64,
    sender: SyncSender<LogMessage>,
    handle: Option<JoinHandle<()>>,
}

impl LogWorker {
    pub fn spawn(path: &Path, capacity: usize) -> io::Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        let (sender, receiver) = sync_channel(capacity.max(1));

        let handle = thread::Builder::new()
            .name("disco-log".to_string())
            .spawn(move || {
                for message in receiver {
                    match message {
                        LogMessage::Line(line) => {
                            let _ = file.write_all(&line);
                            let _ = file.flush();
                        }
                        LogMessage::Shutdown => break,
                    }
                }
            })?;

        Ok(Self {
            id: NEXT_WORKER_ID.fetch_add(1, Ordering::Relaxed),
            sender,
            handle: Some(handle),
        })
    }

    pub fn writer(&self) -> ChannelWriter {
        ChannelWriter {
            sender: self.sender.clone(),
        }
    }

    pub fn is_running(&self) -> bool {
        self.handle.is_some()
    }

    pub fn shutdown(&mut self) {
        let Some(handle) = self.handle.take() else {
            return;
        };
        let _ = self.sender.send(LogMessage::Shutdown);
        let _ = handle.join();
    }
}

impl Drop for LogWorker {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[derive(Clone)]
pub struct ChannelWriter {
    sender: SyncSender<LogMessage>,
}

impl Write for ChannelWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let _ = self.sender.send(LogMessage::Line(buf.to_vec()));
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

struct ActiveWriter;

impl Write for ActiveWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let writer = ACTIVE_WRITER
            .read()
            .ok()
            .and_then(|active| active.as_ref().map(|(_, writer)| writer.clone()));
        match writer {
            Some(mut writer) => writer.write(buf),
            None => Ok(buf.len()),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

fn set_active_writer(worker: &LogWorker) {
    if let Ok(mut active) = ACTIVE_WRITER.write() {
        *active = Some((worker.id, worker.writer()));
    }
}

fn clear_active_writer(worker_id: u64) {
    if let Ok(mut active) = ACTIVE_WRITER.write() {
        if active.as_ref().is_some_and(|(id, _)| *id == worker_id) {
            *active = None;
        }
    }
}

pub fn subscriber(
    level: &str,
    make_writer: BoxMakeWriter,
) -> (impl tracing::Subscriber + Send + Sync, FilterHandle) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let (filter, handle) = reload::Layer::new(filter);
    let subscriber = tracing_subscriber::registry().with(filter).with(
        fmt::layer()
            .with_ansi(false)
            .with_target(false)
            .with_writer(make_writer),
    );
    (subscriber, handle)
}

pub struct Logging {
    worker: LogWorker,
    filter: Option<FilterHandle>,
}

impl Logging {
    /// Starts a worker and points the process-wide subscriber at it. The
    /// subscriber is installed on the first call only; later calls reuse it
    /// and reapply the configured level. If another subscriber was installed
    /// first, events never reach the worker and the level cannot change.
    pub fn init(config: &PluginConfig) -> Result<Self, PluginError> {
        let worker = LogWorker::spawn(&config.log_path(), config.log_queue_capacity)?;
        set_active_writer(&worker);

        let mut installed_now = false;
        let filter = GLOBAL_FILTER
            .get_or_init(|| {
                installed_now = true;
                let (subscriber, handle) =
                    subscriber(&config.log_level, BoxMakeWriter::new(|| ActiveWriter));
                tracing::subscriber::set_global_default(subscriber)
                    .is_ok()
                    .then_some(handle)
            })
            .clone();

        let logging = Self { worker, filter };
        if !installed_now {
            logging.set_level(&config.log_level)?;
        }
        Ok(logging)
    }

    pub fn has_filter_handle(&self) -> bool {
        self.filter.is_some()
    }

    pub fn set_level(&self, level: &str) -> Result<bool, PluginError> {
        let Some(handle) = &self.filter else {
            return Ok(false);
        };
        let filter =
            EnvFilter::try_new(level).map_err(|err| PluginError::Logging(err.to_string()))?;
        handle
            .reload(filter)
            .map_err(|err| PluginError::Logging(err.to_string()))?;
        Ok(true)
    }

    pub fn shutdown(&mut self) {
        clear_active_writer(self.worker.id);
        self.worker.shutdown();
    }
}

impl Drop for Logging {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn worker_drains_queued_lines_on_shutdown() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("logs").join("disco.log");
        let mut worker = LogWorker::spawn(&path, 4).expect("spawn worker");

        let mut writer = worker.writer();
        for index in 0..32 {
            writeln!(writer, "line {index}").expect("write");
        }
        worker.shutdown();
        worker.shutdown();
        assert!(!worker.is_running());

        writeln!(writer, "after shutdown").expect("write is discarded");

        let content = fs::read_to_string(&path).expect("read log");
        assert_eq!(content.lines().count(), 32);
        assert!(content.starts_with("line 0\n"));
        assert!(content.ends_with("line 31\n"));
    }

    #[test]
    fn subscriber_writes_events_and_reloads_level() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("disco.log");
        let mut worker = LogWorker::spawn(&path, 16).expect("spawn worker");
        let writer = worker.writer();
        let (subscriber, handle) =
            subscriber("info", BoxMakeWriter::new(move || writer.clone()));

        tracing::subscriber::with_default(subscriber, || {
            tracing::debug!(event = "hidden_before_reload");
            tracing::info!(event = "system_created", system_address = 1000_u64);
            handle
                .reload(EnvFilter::new("debug"))
                .expect("reload filter");
            tracing::debug!(event = "visible_after_reload");
        });
        worker.shutdown();

        let content = fs::read_to_string(&path).expect("read log");
        assert!(content.contains("system_created"));
        assert!(content.contains("system_address=1000"));
        assert!(content.contains("visible_after_reload"));
        assert!(!content.contains("hidden_before_reload"));
    }

    #[test]
    fn restarted_logging_reuses_the_global_subscriber() {
        let _guard = GLOBAL_LOGGING_TEST_LOCK
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let dir = tempfile::tempdir().expect("tempdir");

        let first_config = PluginConfig::default().with_data_dir(dir.path().join("first"));
        let mut first = Logging::init(&first_config).expect("first init");
        first.shutdown();

        let second_config = PluginConfig::default().with_data_dir(dir.path().join("second"));
        let mut second = Logging::init(&second_config).expect("second init");
        assert!(second.has_filter_handle());
        assert!(second.set_level("info").expect("reload level"));
        tracing::warn!(event = "logging_restarted");
        second.shutdown();

        let content = fs::read_to_string(second_config.log_path()).expect("read log");
        assert!(content.contains("logging_restarted"));
        let first_content = fs::read_to_string(first_config.log_path()).expect("read log");
        assert!(!first_content.contains("logging_restarted"));
    }
}
