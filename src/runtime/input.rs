//! The pluggable input provider and output sink (spec §4.5/§5's
//! interactive-bridge resource model), plus the `RunRegistry` that keeps
//! interactive runs alive across driver polls (spec §9's supplemented
//! feature, grounded in `scripts/interpret_server.py`'s `RUNS` dict).

use crate::error::RuntimeError;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;
use tracing::debug;

/// Supplies the string typed/sent in response to an `input(prompt?)`
/// expression. Implementations must be usable from any evaluator task.
pub trait InputProvider: Send + Sync {
    /// Blocks (by whatever means the implementation chooses) until a line
    /// is available, then returns it.
    ///
    /// # Errors
    /// Returns [`RuntimeError::InputProvider`] if no line can ever arrive
    /// (e.g. the run was retired while waiting).
    fn read_line(&self, prompt: Option<&str>) -> Result<String, RuntimeError>;
}

/// Mode (a): a fixed queue of pre-supplied lines, consumed in order.
/// Used for tests and non-interactive CLI piping.
#[derive(Debug, Default)]
pub struct DirectInputProvider {
    lines: Mutex<std::collections::VecDeque<String>>,
}

impl DirectInputProvider {
    /// Builds a provider that replays `lines` in order, one per `input()`
    /// call.
    #[must_use]
    pub fn new(lines: Vec<String>) -> Self {
        Self {
            lines: Mutex::new(lines.into()),
        }
    }
}

impl InputProvider for DirectInputProvider {
    fn read_line(&self, _prompt: Option<&str>) -> Result<String, RuntimeError> {
        self.lines
            .lock()
            .expect("direct input queue lock poisoned")
            .pop_front()
            .ok_or_else(|| RuntimeError::InputProvider("no more input lines available".into()))
    }
}

/// A single-slot rendezvous: the evaluator's `read_line` blocks here until
/// an external driver calls `post`.
#[derive(Debug, Default)]
struct Rendezvous {
    slot: Mutex<Option<String>>,
    filled: Condvar,
    retired: Mutex<bool>,
}

impl Rendezvous {
    fn post(&self, line: String) {
        let mut slot = self.slot.lock().expect("rendezvous slot lock poisoned");
        *slot = Some(line);
        self.filled.notify_one();
    }

    fn retire(&self) {
        *self.retired.lock().expect("rendezvous retired lock poisoned") = true;
        self.filled.notify_one();
    }

    fn recv(&self) -> Result<String, RuntimeError> {
        let mut slot = self.slot.lock().expect("rendezvous slot lock poisoned");
        loop {
            if let Some(line) = slot.take() {
                return Ok(line);
            }
            if *self.retired.lock().expect("rendezvous retired lock poisoned") {
                return Err(RuntimeError::InputProvider(
                    "run was retired while waiting for input".into(),
                ));
            }
            slot = self
                .filled
                .wait_timeout(slot, Duration::from_millis(200))
                .expect("rendezvous condvar wait poisoned")
                .0;
        }
    }
}

/// One active interactive run's state: the fields spec §5 lists as a "run
/// record" plus the rendezvous used to wake it.
#[derive(Debug)]
pub struct RunRecord {
    run_id: String,
    rendezvous: Rendezvous,
    buffer: Mutex<String>,
    waiting: Mutex<bool>,
    prompt: Mutex<Option<String>>,
    finished: Mutex<bool>,
    error: Mutex<Option<String>>,
    last_active: Mutex<DateTime<Utc>>,
}

impl RunRecord {
    fn new(run_id: String, now: DateTime<Utc>) -> Self {
        Self {
            run_id,
            rendezvous: Rendezvous::default(),
            buffer: Mutex::new(String::new()),
            waiting: Mutex::new(false),
            prompt: Mutex::new(None),
            finished: Mutex::new(false),
            error: Mutex::new(None),
            last_active: Mutex::new(now),
        }
    }

    /// The run id this record was registered under.
    #[must_use]
    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// The output accumulated so far.
    #[must_use]
    pub fn buffer(&self) -> String {
        self.buffer.lock().expect("run buffer lock poisoned").clone()
    }

    /// Whether the run is currently blocked on `input()`.
    #[must_use]
    pub fn waiting(&self) -> bool {
        *self.waiting.lock().expect("run waiting lock poisoned")
    }

    /// The prompt passed to the current `input()` call, if waiting.
    #[must_use]
    pub fn prompt(&self) -> Option<String> {
        self.prompt.lock().expect("run prompt lock poisoned").clone()
    }

    /// Whether evaluation has terminated (successfully or with an error).
    #[must_use]
    pub fn finished(&self) -> bool {
        *self.finished.lock().expect("run finished lock poisoned")
    }

    /// The captured runtime error, if the run terminated with one.
    #[must_use]
    pub fn error(&self) -> Option<String> {
        self.error.lock().expect("run error lock poisoned").clone()
    }

    /// Appends to the run's output buffer (called by the output sink).
    pub fn append_output(&self, text: &str) {
        self.buffer.lock().expect("run buffer lock poisoned").push_str(text);
        self.touch();
    }

    /// Marks the run finished, optionally with a captured error.
    pub fn mark_finished(&self, error: Option<String>) {
        *self.finished.lock().expect("run finished lock poisoned") = true;
        *self.error.lock().expect("run error lock poisoned") = error;
        self.rendezvous.retire();
    }

    fn touch(&self) {
        *self.last_active.lock().expect("run last_active lock poisoned") = Utc::now();
    }

    /// Supplies a line to a task blocked in `read_line`, waking it.
    pub fn supply_input(&self, line: impl Into<String>) {
        *self.waiting.lock().expect("run waiting lock poisoned") = false;
        *self.prompt.lock().expect("run prompt lock poisoned") = None;
        self.touch();
        self.rendezvous.post(line.into());
    }
}

impl InputProvider for RunRecord {
    fn read_line(&self, prompt: Option<&str>) -> Result<String, RuntimeError> {
        *self.prompt.lock().expect("run prompt lock poisoned") = prompt.map(str::to_string);
        *self.waiting.lock().expect("run waiting lock poisoned") = true;
        self.touch();
        debug!(run_id = %self.run_id, ?prompt, "interactive run waiting for input");
        self.rendezvous.recv()
    }
}

/// Registry of live interactive runs, keyed by `run_id`. Grounded in
/// `scripts/interpret_server.py`'s module-level `RUNS` dict; a best-effort
/// idle reap replaces that script's manual cleanup.
#[derive(Debug, Default)]
pub struct RunRegistry {
    runs: Mutex<HashMap<String, Arc<RunRecord>>>,
}

impl RunRegistry {
    /// An empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a fresh run record with a newly generated id.
    #[must_use]
    pub fn create(&self) -> Arc<RunRecord> {
        let run_id = uuid::Uuid::new_v4().to_string();
        let record = Arc::new(RunRecord::new(run_id.clone(), Utc::now()));
        self.runs
            .lock()
            .expect("run registry lock poisoned")
            .insert(run_id, Arc::clone(&record));
        record
    }

    /// Looks up a run by id.
    #[must_use]
    pub fn get(&self, run_id: &str) -> Option<Arc<RunRecord>> {
        self.runs.lock().expect("run registry lock poisoned").get(run_id).cloned()
    }

    /// Explicitly retires and removes a run.
    pub fn retire(&self, run_id: &str) {
        if let Some(record) = self
            .runs
            .lock()
            .expect("run registry lock poisoned")
            .remove(run_id)
        {
            record.mark_finished(record.error());
        }
    }

    /// Removes runs idle (no `touch`) past `timeout`, per spec §5's "the
    /// record is retained until the driver explicitly retires it or a
    /// timeout reaps it."
    pub fn reap_idle(&self, timeout: Duration) {
        let now = Utc::now();
        let mut runs = self.runs.lock().expect("run registry lock poisoned");
        runs.retain(|_, record| {
            let last_active = *record.last_active.lock().expect("run last_active lock poisoned");
            let idle = now.signed_duration_since(last_active);
            idle.to_std().map(|d| d < timeout).unwrap_or(true)
        });
    }
}

/// Where `print` writes; holds the "dedicated print lock" spec §5 requires
/// so whole print units aren't interleaved character-by-character.
pub trait OutputSink: Send + Sync {
    /// Writes `text` atomically with respect to other writers.
    fn write(&self, text: &str);

    /// Downcast support, so callers holding a `dyn OutputSink` (e.g.
    /// [`crate::RunHandle::output`]) can recover a concrete sink like
    /// [`BufferSink`] when they know which one was configured.
    fn as_any(&self) -> &dyn std::any::Any;
}

/// Writes to process stdout, serialized by an internal mutex.
#[derive(Debug, Default)]
pub struct StdoutSink {
    lock: Mutex<()>,
}

impl StdoutSink {
    /// A fresh stdout sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl OutputSink for StdoutSink {
    fn write(&self, text: &str) {
        let _guard = self.lock.lock().expect("stdout sink lock poisoned");
        use std::io::Write as _;
        print!("{text}");
        let _ = std::io::stdout().flush();
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}

/// Collects output into an in-memory buffer, used for tests and for
/// direct (non-interactive) `Pipeline::execute` runs.
#[derive(Debug, Default)]
pub struct BufferSink {
    buffer: Mutex<String>,
}

impl BufferSink {
    /// An empty buffer sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The accumulated output so far.
    #[must_use]
    pub fn contents(&self) -> String {
        self.buffer.lock().expect("buffer sink lock poisoned").clone()
    }
}

impl OutputSink for BufferSink {
    fn write(&self, text: &str) {
        self.buffer.lock().expect("buffer sink lock poisoned").push_str(text);
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}

/// Routes output both into a [`RunRecord`]'s buffer (for driver polling)
/// and an underlying sink (e.g. stdout), for the interactive-bridge mode.
pub struct RunRecordSink {
    record: Arc<RunRecord>,
}

impl RunRecordSink {
    /// Wraps `record` so writes update its output buffer.
    #[must_use]
    pub fn new(record: Arc<RunRecord>) -> Self {
        Self { record }
    }
}

impl OutputSink for RunRecordSink {
    fn write(&self, text: &str) {
        self.record.append_output(text);
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn direct_provider_replays_in_order() {
        let provider = DirectInputProvider::new(vec!["21".to_string(), "twenty-one".to_string()]);
        assert_eq!(provider.read_line(None).unwrap(), "21");
        assert_eq!(provider.read_line(None).unwrap(), "twenty-one");
        assert!(provider.read_line(None).is_err());
    }

    #[test]
    fn run_record_rendezvous_blocks_until_supplied() {
        let registry = RunRegistry::new();
        let record = registry.create();
        let record2 = Arc::clone(&record);
        let handle = std::thread::spawn(move || record2.read_line(Some("age? ")));
        std::thread::sleep(Duration::from_millis(20));
        assert!(record.waiting());
        assert_eq!(record.prompt().as_deref(), Some("age? "));
        record.supply_input("21");
        assert_eq!(handle.join().unwrap().unwrap(), "21");
        assert!(!record.waiting());
    }
}
