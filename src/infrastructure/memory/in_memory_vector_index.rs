use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;

use crate::application::ports::vector_index::{
    PointInventory, PointPage, VectorIndex, VectorIndexError, VectorPoint,
};
use crate::domain::value_objects::PointId;

#[derive(Default)]
struct IndexState {
    points: BTreeMap<PointId, VectorPoint>,
    delete_attempts: Vec<PointId>,
}

/// Vector index kept in process memory. Outages and latency can be switched
/// on at runtime to exercise the retry and timeout paths.
pub struct InMemoryVectorIndex {
    state: Mutex<IndexState>,
    available: AtomicBool,
    latency_ms: AtomicU64,
    inventory_enabled: AtomicBool,
}

impl Default for InMemoryVectorIndex {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryVectorIndex {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(IndexState::default()),
            available: AtomicBool::new(true),
            latency_ms: AtomicU64::new(0),
            inventory_enabled: AtomicBool::new(true),
        }
    }

    fn state(&self) -> MutexGuard<'_, IndexState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    pub fn set_latency(&self, latency: Duration) {
        self.latency_ms
            .store(latency.as_millis() as u64, Ordering::SeqCst);
    }

    pub fn set_inventory_enabled(&self, enabled: bool) {
        self.inventory_enabled.store(enabled, Ordering::SeqCst);
    }

    pub fn contains(&self, point_id: PointId) -> bool {
        self.state().points.contains_key(&point_id)
    }

    pub fn get(&self, point_id: PointId) -> Option<VectorPoint> {
        self.state().points.get(&point_id).cloned()
    }

    pub fn len(&self) -> usize {
        self.state().points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state().points.is_empty()
    }

    /// Whether `delete` was ever called for this point, successful or not.
    pub fn delete_attempted(&self, point_id: PointId) -> bool {
        self.state().delete_attempts.contains(&point_id)
    }

    /// Drops a point without going through `delete`, as if lost by the index.
    #[cfg(test)]
    pub fn remove_silently(&self, point_id: PointId) {
        self.state().points.remove(&point_id);
    }

    async fn simulate_call(&self) -> Result<(), VectorIndexError> {
        let latency = self.latency_ms.load(Ordering::SeqCst);
        if latency > 0 {
            tokio::time::sleep(Duration::from_millis(latency)).await;
        }

        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(VectorIndexError::Unavailable(
                "in-memory index switched off".to_string(),
            ))
        }
    }
}

#[async_trait]
impl VectorIndex for InMemoryVectorIndex {
    async fn upsert(&self, point: VectorPoint) -> Result<(), VectorIndexError> {
        if point.vector.is_empty() {
            return Err(VectorIndexError::Rejected("empty vector".to_string()));
        }

        self.simulate_call().await?;
        self.state().points.insert(point.id, point);
        Ok(())
    }

    async fn delete(&self, point_id: PointId) -> Result<(), VectorIndexError> {
        self.state().delete_attempts.push(point_id);
        self.simulate_call().await?;
        self.state().points.remove(&point_id);
        Ok(())
    }

    async fn health_check(&self) -> Result<bool, VectorIndexError> {
        Ok(self.available.load(Ordering::SeqCst))
    }

    fn inventory(&self) -> Option<&dyn PointInventory> {
        if self.inventory_enabled.load(Ordering::SeqCst) {
            Some(self)
        } else {
            None
        }
    }
}

#[async_trait]
impl PointInventory for InMemoryVectorIndex {
    /// `offset` is inclusive and `next_offset` is the first id of the next page.
    async fn scroll_point_ids(
        &self,
        offset: Option<PointId>,
        limit: usize,
    ) -> Result<PointPage, VectorIndexError> {
        self.simulate_call().await?;

        let state = self.state();
        let mut ids: Vec<PointId> = match offset {
            Some(offset) => state.points.range(offset..).map(|(id, _)| *id).take(limit + 1).collect(),
            None => state.points.keys().copied().take(limit + 1).collect(),
        };

        let next_offset = if ids.len() > limit { ids.pop() } else { None };
        Ok(PointPage {
            point_ids: ids,
            next_offset,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn point() -> VectorPoint {
        VectorPoint {
            id: PointId::new(),
            vector: vec![0.5; 4],
            payload: json!({}),
        }
    }

    #[tokio::test]
    async fn test_scroll_visits_every_point_once() {
        let index = InMemoryVectorIndex::new();
        for _ in 0..5 {
            index.upsert(point()).await.unwrap();
        }

        let mut seen = Vec::new();
        let mut offset = None;
        loop {
            let page = index.scroll_point_ids(offset, 2).await.unwrap();
            seen.extend(page.point_ids);
            match page.next_offset {
                Some(next) => offset = Some(next),
                None => break,
            }
        }

        assert_eq!(seen.len(), 5);
        seen.dedup();
        assert_eq!(seen.len(), 5);
    }

    #[tokio::test]
    async fn test_outage_rejects_calls_but_records_delete_attempt() {
        let index = InMemoryVectorIndex::new();
        let p = point();
        let id = p.id;
        index.upsert(p).await.unwrap();
        index.set_available(false);

        assert!(index.delete(id).await.is_err());
        assert!(index.delete_attempted(id));
        assert!(index.contains(id));
        assert!(!index.health_check().await.unwrap());
    }

    #[tokio::test]
    async fn test_empty_vector_is_rejected() {
        let index = InMemoryVectorIndex::new();
        let error = index
            .upsert(VectorPoint {
                vector: Vec::new(),
                ..point()
            })
            .await
            .unwrap_err();
        assert!(!error.is_retryable());
    }
}
