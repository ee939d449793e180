//! Application instances attached to the registration

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One attached application instance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientRecord {
    /// Client id
    pub id: Uuid,
    /// Worker controlling this client, if any
    pub controller: Option<Uuid>,
    /// When the client attached
    pub attached_at: DateTime<Utc>,
}

/// Shared set of attached clients
#[derive(Debug, Default)]
pub struct Clients {
    records: Mutex<Vec<ClientRecord>>,
}

impl Clients {
    /// Restore from persisted records
    pub fn from_records(records: Vec<ClientRecord>) -> Self {
        Self {
            records: Mutex::new(records),
        }
    }

    /// Copy of all records
    pub fn snapshot(&self) -> Vec<ClientRecord> {
        self.records.lock().clone()
    }

    /// Attach a new client under `controller`
    pub fn attach(&self, controller: Option<Uuid>) -> ClientRecord {
        let record = ClientRecord {
            id: Uuid::new_v4(),
            controller,
            attached_at: Utc::now(),
        };
        self.records.lock().push(record.clone());
        record
    }

    /// Detach a client. Returns whether it was attached.
    pub fn detach(&self, id: Uuid) -> bool {
        let mut records = self.records.lock();
        let before = records.len();
        records.retain(|r| r.id != id);
        records.len() != before
    }

    /// Put every client under `worker`. Returns how many changed controller.
    pub fn claim(&self, worker: Uuid) -> usize {
        let mut records = self.records.lock();
        let mut changed = 0;
        for record in records.iter_mut() {
            if record.controller != Some(worker) {
                record.controller = Some(worker);
                changed += 1;
            }
        }
        changed
    }

    /// Number of clients controlled by `worker`
    pub fn controlled_by(&self, worker: Uuid) -> usize {
        self.records
            .lock()
            .iter()
            .filter(|r| r.controller == Some(worker))
            .count()
    }

    /// Number of attached clients
    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    /// Whether no client is attached
    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }
}
