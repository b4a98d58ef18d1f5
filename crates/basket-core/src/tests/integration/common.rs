#![cfg(test)]

use std::sync::{Arc, Mutex, OnceLock};
use std::time::Duration;

use crate::service_system::{ControllerConfig, LoadCallback, Service, ServiceLoadError};

/// Records every log line so tests can assert on scheduler output, and
/// forwards to env_logger so RUST_LOG still prints them
struct RecordingLogger {
    inner: env_logger::Logger,
    entries: Mutex<Vec<String>>,
}

impl log::Log for RecordingLogger {
    fn enabled(&self, _metadata: &log::Metadata<'_>) -> bool {
        true
    }

    fn log(&self, record: &log::Record<'_>) {
        self.entries
            .lock()
            .unwrap()
            .push(format!("{} {} {}", record.level(), record.target(), record.args()));
        self.inner.log(record);
    }

    fn flush(&self) {
        self.inner.flush();
    }
}

static LOGGER: OnceLock<RecordingLogger> = OnceLock::new();

/// Install the recording logger once per test binary
pub fn init_logging() {
    let logger = LOGGER.get_or_init(|| RecordingLogger {
        inner: env_logger::Builder::from_default_env().is_test(true).build(),
        entries: Mutex::new(Vec::new()),
    });
    if log::set_logger(logger).is_ok() {
        log::set_max_level(log::LevelFilter::Trace);
    }
}

/// Every line logged since `init_logging`, as "LEVEL target message"
pub fn captured_logs() -> Vec<String> {
    LOGGER
        .get()
        .map(|logger| logger.entries.lock().unwrap().clone())
        .unwrap_or_default()
}

/// Config with short wait periods so timeout paths run quickly
pub fn fast_config() -> ControllerConfig {
    ControllerConfig::default().with_round_timeout(Duration::from_millis(25))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Started(String),
    Completed(String),
}

/// Records the global order in which services start and complete
#[derive(Debug, Default)]
pub struct ExecutionTracker {
    events: Mutex<Vec<Event>>,
}

impl ExecutionTracker {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn record(&self, event: Event) {
        self.events.lock().unwrap().push(event);
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }

    /// Keys in the order their loads were started
    pub fn start_order(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                Event::Started(key) => Some(key),
                Event::Completed(_) => None,
            })
            .collect()
    }

    pub fn position(&self, event: &Event) -> Option<usize> {
        self.events().iter().position(|e| e == event)
    }

    /// Assert `key` started only after `dependency` completed
    pub fn assert_started_after(&self, key: &str, dependency: &str) {
        let started = self
            .position(&Event::Started(key.to_string()))
            .unwrap_or_else(|| panic!("{} never started", key));
        let completed = self
            .position(&Event::Completed(dependency.to_string()))
            .unwrap_or_else(|| panic!("{} never completed", dependency));
        assert!(
            completed < started,
            "{} started at {} before dependency {} completed at {}",
            key,
            started,
            dependency,
            completed
        );
    }
}

/// Holds a callback the test fires later (or never)
pub type HeldCallback = Arc<Mutex<Option<LoadCallback>>>;

#[derive(Clone)]
pub enum Behavior {
    Succeed,
    SucceedAfter(Duration),
    Fail(&'static str),
    DropCallback,
    Hold(HeldCallback),
}

/// Instrumented fake service
pub struct TrackedService {
    key: String,
    tracker: Arc<ExecutionTracker>,
    behavior: Behavior,
}

impl TrackedService {
    pub fn new(key: &str, tracker: &Arc<ExecutionTracker>, behavior: Behavior) -> Arc<Self> {
        Arc::new(Self {
            key: key.to_string(),
            tracker: Arc::clone(tracker),
            behavior,
        })
    }

    pub fn succeeding(key: &str, tracker: &Arc<ExecutionTracker>) -> Arc<Self> {
        Self::new(key, tracker, Behavior::Succeed)
    }
}

impl Service for TrackedService {
    fn load_service(&self, callback: LoadCallback) {
        self.tracker.record(Event::Started(self.key.clone()));
        match &self.behavior {
            Behavior::Succeed => {
                self.tracker.record(Event::Completed(self.key.clone()));
                callback.succeed();
            }
            Behavior::SucceedAfter(delay) => {
                let delay = *delay;
                let key = self.key.clone();
                let tracker = Arc::clone(&self.tracker);
                std::thread::spawn(move || {
                    std::thread::sleep(delay);
                    tracker.record(Event::Completed(key));
                    callback.succeed();
                });
            }
            Behavior::Fail(message) => callback.fail(ServiceLoadError::new(*message)),
            Behavior::DropCallback => drop(callback),
            Behavior::Hold(slot) => {
                *slot.lock().unwrap() = Some(callback);
            }
        }
    }

    fn name(&self) -> &str {
        &self.key
    }
}

/// Fire a held callback, recording completion
pub fn release(slot: &HeldCallback, tracker: &ExecutionTracker) {
    let callback = slot.lock().unwrap().take().expect("callback was never handed over");
    tracker.record(Event::Completed(callback.key().to_string()));
    callback.succeed();
}
