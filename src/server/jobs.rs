use serde::Serialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use uuid::Uuid;

/// Events may pile up while no reader is attached; past this point the
/// oldest progress ticks are simply lost
const QUEUE_CAPACITY: usize = 256;

/// One event on a job's queue
#[derive(Debug, Clone, Serialize)]
pub enum JobEvent {
    Progress { progress: u8, stage: String },
    Done { result: Value },
    Error { error: String },
}

impl JobEvent {
    /// SSE event name
    pub fn name(&self) -> &'static str {
        match self {
            JobEvent::Progress { .. } => "progress",
            JobEvent::Done { .. } => "done",
            JobEvent::Error { .. } => "error",
        }
    }

    /// SSE data payload
    pub fn data(&self) -> Value {
        match self {
            JobEvent::Progress { progress, stage } => {
                json!({"progress": progress, "stage": stage})
            }
            JobEvent::Done { result } => json!({"result": result}),
            JobEvent::Error { error } => json!({"error": error}),
        }
    }

    /// `done` and `error` close the stream
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobEvent::Done { .. } | JobEvent::Error { .. })
    }
}

struct JobSlot {
    tx: mpsc::Sender<JobEvent>,
    rx: Option<mpsc::Receiver<JobEvent>>,
}

/// Process-wide job registry; the only cross-request state in the service
#[derive(Default)]
pub struct JobTable {
    jobs: Mutex<HashMap<Uuid, JobSlot>>,
}

impl JobTable {
    pub fn new() -> Self {
        JobTable::default()
    }

    /// Mint a job id with a fresh bounded queue
    pub fn create(&self) -> Uuid {
        let id = Uuid::new_v4();
        let (tx, rx) = mpsc::channel(QUEUE_CAPACITY);
        self.jobs
            .lock()
            .unwrap()
            .insert(id, JobSlot { tx, rx: Some(rx) });
        id
    }

    /// Push an event onto the job's queue. Unknown jobs and full queues
    /// swallow the event; progress must never block or fail the solve.
    pub fn push_event(&self, id: Uuid, event: JobEvent) {
        let jobs = self.jobs.lock().unwrap();
        if let Some(slot) = jobs.get(&id) {
            let _ = slot.tx.try_send(event);
        }
    }

    /// Take the job's receiving end; one consumer per job
    pub fn subscribe(&self, id: Uuid) -> Option<JobFeed> {
        let mut jobs = self.jobs.lock().unwrap();
        let slot = jobs.get_mut(&id)?;
        let rx = slot.rx.take()?;
        Some(JobFeed { rx })
    }

    /// Drop the job after `after`. Dropping the slot also drops the sender,
    /// so an attached feed sees the queue close.
    pub fn evict(self: Arc<Self>, id: Uuid, after: Duration) {
        tokio::spawn(async move {
            tokio::time::sleep(after).await;
            self.jobs.lock().unwrap().remove(&id);
        });
    }

    pub fn contains(&self, id: Uuid) -> bool {
        self.jobs.lock().unwrap().contains_key(&id)
    }

    /// Number of live jobs, for the health endpoint
    pub fn len(&self) -> usize {
        self.jobs.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// What one wait on the queue produced
pub enum Drained {
    Event(JobEvent),
    /// Nothing arrived within the timeout; time for a heartbeat
    Idle,
    /// Producer gone and queue exhausted
    Closed,
}

/// Receiving side of a job's event queue
pub struct JobFeed {
    rx: mpsc::Receiver<JobEvent>,
}

impl JobFeed {
    /// Wait up to `timeout` for the next event
    pub async fn drain(&mut self, timeout: Duration) -> Drained {
        match tokio::time::timeout(timeout, self.rx.recv()).await {
            Ok(Some(event)) => Drained::Event(event),
            Ok(None) => Drained::Closed,
            Err(_) => Drained::Idle,
        }
    }
}
