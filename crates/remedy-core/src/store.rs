//! Bug-report store interface and in-memory implementation.
//!
//! Persistence is an external collaborator; the core only needs key/value
//! CRUD over [`BugReport`] records. The in-memory store satisfies the trait
//! contract without any external dependencies.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::{BugReport, BugStatus, RemedyError, Result};

/// CRUD over bug-report records.
#[async_trait]
pub trait BugReportStore: Send + Sync {
    /// Create a new open report and return it.
    async fn create(&self, description: &str) -> Result<BugReport>;

    /// Fetch a report by id.
    async fn get(&self, id: Uuid) -> Result<BugReport>;

    /// List reports in creation order, with offset pagination.
    async fn list(&self, skip: usize, limit: usize) -> Result<Vec<BugReport>>;

    /// Update a report's status, returning the updated record.
    async fn update_status(&self, id: Uuid, status: BugStatus) -> Result<BugReport>;

    /// Delete a report.
    async fn delete(&self, id: Uuid) -> Result<()>;
}

/// In-memory bug-report store backed by a `HashMap`.
#[derive(Debug, Default)]
pub struct MemoryBugStore {
    reports: Mutex<HashMap<Uuid, BugReport>>,
    order: Mutex<Vec<Uuid>>,
}

impl MemoryBugStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BugReportStore for MemoryBugStore {
    async fn create(&self, description: &str) -> Result<BugReport> {
        let report = BugReport::new(description);
        self.reports
            .lock()
            .unwrap()
            .insert(report.id, report.clone());
        self.order.lock().unwrap().push(report.id);
        Ok(report)
    }

    async fn get(&self, id: Uuid) -> Result<BugReport> {
        self.reports
            .lock()
            .unwrap()
            .get(&id)
            .cloned()
            .ok_or(RemedyError::BugNotFound(id))
    }

    async fn list(&self, skip: usize, limit: usize) -> Result<Vec<BugReport>> {
        let reports = self.reports.lock().unwrap();
        let order = self.order.lock().unwrap();
        Ok(order
            .iter()
            .skip(skip)
            .take(limit)
            .filter_map(|id| reports.get(id).cloned())
            .collect())
    }

    async fn update_status(&self, id: Uuid, status: BugStatus) -> Result<BugReport> {
        let mut reports = self.reports.lock().unwrap();
        let report = reports.get_mut(&id).ok_or(RemedyError::BugNotFound(id))?;
        report.status = status;
        Ok(report.clone())
    }

    async fn delete(&self, id: Uuid) -> Result<()> {
        self.reports
            .lock()
            .unwrap()
            .remove(&id)
            .ok_or(RemedyError::BugNotFound(id))?;
        self.order.lock().unwrap().retain(|existing| *existing != id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_create_then_get() {
        let store = MemoryBugStore::new();
        let created = store.create("ZeroDivisionError in divide()").await.unwrap();
        let fetched = store.get(created.id).await.unwrap();
        assert_eq!(created, fetched);
        assert_eq!(fetched.status, BugStatus::Open);
    }

    #[tokio::test]
    async fn test_get_missing_returns_not_found() {
        let store = MemoryBugStore::new();
        let result = store.get(Uuid::new_v4()).await;
        assert!(matches!(result, Err(RemedyError::BugNotFound(_))));
    }

    #[tokio::test]
    async fn test_list_respects_pagination_and_order() {
        let store = MemoryBugStore::new();
        for i in 0..5 {
            store.create(&format!("bug {i}")).await.unwrap();
        }
        let page = store.list(1, 2).await.unwrap();
        assert_eq!(page.len(), 2);
        assert_eq!(page[0].description, "bug 1");
        assert_eq!(page[1].description, "bug 2");
    }

    #[tokio::test]
    async fn test_update_status() {
        let store = MemoryBugStore::new();
        let report = store.create("bug").await.unwrap();
        let updated = store
            .update_status(report.id, BugStatus::Fixed)
            .await
            .unwrap();
        assert_eq!(updated.status, BugStatus::Fixed);
        assert_eq!(store.get(report.id).await.unwrap().status, BugStatus::Fixed);
    }

    #[tokio::test]
    async fn test_delete_removes_from_listing() {
        let store = MemoryBugStore::new();
        let report = store.create("bug").await.unwrap();
        store.delete(report.id).await.unwrap();
        assert!(store.get(report.id).await.is_err());
        assert!(store.list(0, 10).await.unwrap().is_empty());
    }
}
