#![allow(dead_code)]

use std::collections::VecDeque;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use journey::events::EventSink;
use journey::model::Journey;
use journey::store::{JourneyStore, MemoryJourneyStore};
use serde_json::{json, Value};
use tempfile::TempDir;
use tokio::sync::{oneshot, Notify};

/// G1 with T1 (todo) and T2 (completed).
pub fn g1_document() -> Value {
    json!({
        "current_goals": [{
            "id": "G1",
            "title": "Launch side project",
            "category": "career",
            "progress": 50,
            "milestones": [
                { "id": "M1", "title": "Prototype ready", "completed": false }
            ],
            "tasks": [
                { "id": "T1", "title": "Sketch screens", "status": "todo", "milestone_id": "M1" },
                { "id": "T2", "title": "Pick a name", "completed": true }
            ]
        }]
    })
}

/// Two goals with a mix of statuses, due dates and missing fields.
pub fn mixed_document() -> Value {
    json!({
        "profile": { "name": "sam" },
        "current_goals": [
            {
                "id": "health",
                "title": "Run a 10k",
                "category": "health",
                "progress": 0,
                "milestones": [{ "id": "base", "title": "Base building" }],
                "tasks": [
                    { "id": "h1", "title": "Base run x3", "status": "in_progress", "milestone_id": "base", "due_date": "2024-03-15T10:00:00Z" },
                    { "id": "h2", "title": "Buy shoes", "completed": true, "due_date": "2024-03-14" },
                    { "id": "h3", "title": "Interval session", "status": "stuck", "due_date": "not-a-date" },
                    { "title": "Rest day" }
                ]
            },
            {
                "title": "Read more",
                "tasks": [
                    { "title": "Pick a book", "status": "In Progress" },
                    { "title": "Read 20 pages", "due_date": "2024-03-15" }
                ]
            }
        ]
    })
}

pub struct TestDir {
    dir: TempDir,
}

impl TestDir {
    pub fn new() -> Self {
        Self {
            dir: tempfile::tempdir().expect("failed to create tempdir"),
        }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn write_file(&self, rel_path: &str, contents: &str) -> PathBuf {
        let path = self.dir.path().join(rel_path);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("create parent");
        }
        fs::write(&path, contents).expect("write file");
        path
    }

    pub fn write_journey(&self, document: &Value) -> PathBuf {
        let contents = serde_json::to_string_pretty(document).expect("serialize journey");
        self.write_file("journey.json", &contents)
    }

    pub fn write_config(&self, contents: &str) -> PathBuf {
        self.write_file(".journey.toml", contents)
    }

    pub fn read_journey(&self) -> Value {
        let contents = fs::read_to_string(self.path().join("journey.json")).expect("read journey");
        serde_json::from_str(&contents).expect("parse journey")
    }
}

/// Shared in-memory writer for inspecting emitted events.
#[derive(Clone, Default)]
pub struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

impl SharedBuffer {
    pub fn sink(&self) -> EventSink {
        EventSink::from_writer(self.clone())
    }

    pub fn lines(&self) -> Vec<Value> {
        let bytes = self.0.lock().expect("buffer lock").clone();
        String::from_utf8(bytes)
            .expect("utf8")
            .lines()
            .map(|line| serde_json::from_str(line).expect("event json"))
            .collect()
    }

    pub fn event_names(&self) -> Vec<String> {
        self.lines()
            .iter()
            .map(|event| event["event"].as_str().unwrap_or_default().to_string())
            .collect()
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().expect("buffer lock").extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

type GateResult = Result<(), String>;

/// Store whose writes block until the test settles them, in any order.
///
/// Write `n` (0-based, in call order) waits on gate `n`. Accepted writes are
/// forwarded to an inner [`MemoryJourneyStore`].
pub struct GatedStore {
    inner: MemoryJourneyStore,
    gates: Mutex<Vec<Option<oneshot::Sender<GateResult>>>>,
    written: Mutex<VecDeque<Journey>>,
    arrived: Notify,
}

impl GatedStore {
    pub fn new(document: Value) -> Self {
        Self {
            inner: MemoryJourneyStore::new(document),
            gates: Mutex::new(Vec::new()),
            written: Mutex::new(VecDeque::new()),
            arrived: Notify::new(),
        }
    }

    pub fn inner(&self) -> &MemoryJourneyStore {
        &self.inner
    }

    /// Wait until at least `count` writes are parked on their gates.
    pub async fn wait_for_writes(&self, count: usize) {
        loop {
            if self.gates.lock().expect("gates lock").len() >= count {
                return;
            }
            self.arrived.notified().await;
        }
    }

    pub fn accept(&self, index: usize) {
        self.settle(index, Ok(()));
    }

    pub fn reject(&self, index: usize, reason: &str) {
        self.settle(index, Err(reason.to_string()));
    }

    /// Journeys handed to the store, in call order.
    pub fn written(&self) -> Vec<Journey> {
        self.written.lock().expect("written lock").iter().cloned().collect()
    }

    fn settle(&self, index: usize, result: GateResult) {
        let sender = self
            .gates
            .lock()
            .expect("gates lock")
            .get_mut(index)
            .and_then(Option::take)
            .expect("gate exists and is unsettled");
        sender.send(result).expect("write still waiting");
    }
}

#[async_trait]
impl JourneyStore for GatedStore {
    async fn get_journey(&self) -> anyhow::Result<Value> {
        self.inner.get_journey().await
    }

    async fn update_journey(&self, journey: &Journey) -> anyhow::Result<()> {
        let (tx, rx) = oneshot::channel();
        self.gates.lock().expect("gates lock").push(Some(tx));
        self.written
            .lock()
            .expect("written lock")
            .push_back(journey.clone());
        self.arrived.notify_one();

        match rx.await {
            Ok(Ok(())) => self.inner.update_journey(journey).await,
            Ok(Err(reason)) => Err(anyhow::anyhow!(reason)),
            Err(_) => Err(anyhow::anyhow!("write gate dropped")),
        }
    }
}
