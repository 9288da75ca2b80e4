//! Session-scoped store of converted documents.

use crate::document::DocumentRecord;

/// Converted documents in upload order.
///
/// The store is not synchronised on its own; it is only reachable through
/// [`KnowledgeBase`](crate::knowledge::KnowledgeBase), which keeps it in step
/// with the vector index.
#[derive(Debug, Clone, Default)]
pub struct DocumentStore {
    records: Vec<DocumentRecord>,
}

impl DocumentStore {
    /// An empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a record. A record with the same id is replaced in place and
    /// returned.
    pub fn add(&mut self, record: DocumentRecord) -> Option<DocumentRecord> {
        match self.records.iter_mut().find(|r| r.id == record.id) {
            Some(existing) => Some(std::mem::replace(existing, record)),
            None => {
                self.records.push(record);
                None
            }
        }
    }

    /// Remove and return the record with `id`.
    pub fn remove(&mut self, id: &str) -> Option<DocumentRecord> {
        let position = self.records.iter().position(|r| r.id == id)?;
        Some(self.records.remove(position))
    }

    /// Look up a record by id.
    pub fn get(&self, id: &str) -> Option<&DocumentRecord> {
        self.records.iter().find(|r| r.id == id)
    }

    /// Whether a record with `id` exists.
    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    /// All records in upload order.
    pub fn list(&self) -> &[DocumentRecord] {
        &self.records
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// True when the store holds no records.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Drop every record.
    pub fn clear(&mut self) {
        self.records.clear();
    }
}
