//! In-memory implementation of [`AuditSink`].

use parking_lot::Mutex;
use tessera_core::error::TesseraResult;
use tessera_core::models::audit::AuditRecord;
use tessera_core::repository::AuditSink;

/// Append-only audit record list.
#[derive(Default)]
pub struct MemoryAuditSink {
    records: Mutex<Vec<AuditRecord>>,
}

impl MemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every record, oldest first.
    pub fn records(&self) -> Vec<AuditRecord> {
        self.records.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }
}

impl AuditSink for MemoryAuditSink {
    async fn append(&self, record: AuditRecord) -> TesseraResult<()> {
        self.records.lock().push(record);
        Ok(())
    }

    async fn for_tenant(&self, tenant_id: &str) -> TesseraResult<Vec<AuditRecord>> {
        Ok(self
            .records
            .lock()
            .iter()
            .filter(|r| r.tenant_id == tenant_id)
            .cloned()
            .collect())
    }

    async fn anonymize_tenant(&self, tenant_id: &str) -> TesseraResult<usize> {
        let mut records = self.records.lock();
        let mut redacted = 0;
        for record in records.iter_mut().filter(|r| r.tenant_id == tenant_id) {
            record.actor = "[redacted]".into();
            record.before = None;
            record.after = None;
            redacted += 1;
        }
        Ok(redacted)
    }
}
