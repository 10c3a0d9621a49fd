//! Position Persistence Abstraction
//!
//! Lets the host persist per-episode resume positions. The core writes
//! through this trait on pause and periodically while playing; it reads
//! back when an episode is loaded again.

use crate::error::Result;
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::time::Duration;

/// Store for per-episode playback positions.
#[async_trait]
pub trait PositionStore: Send + Sync {
    /// Persist the playback position for an episode.
    async fn save_position(&self, episode_id: &str, position: Duration) -> Result<()>;

    /// Load the last saved position for an episode, if any.
    async fn load_position(&self, episode_id: &str) -> Result<Option<Duration>>;

    /// Remove the saved position for an episode (played to completion).
    async fn clear_position(&self, episode_id: &str) -> Result<()>;
}

/// In-memory position store.
///
/// Suitable for tests and for hosts that persist elsewhere.
#[derive(Default)]
pub struct MemoryPositionStore {
    positions: RwLock<HashMap<String, Duration>>,
}

impl MemoryPositionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of episodes with a saved position.
    pub fn len(&self) -> usize {
        self.positions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.read().is_empty()
    }
}

#[async_trait]
impl PositionStore for MemoryPositionStore {
    async fn save_position(&self, episode_id: &str, position: Duration) -> Result<()> {
        self.positions
            .write()
            .insert(episode_id.to_string(), position);
        Ok(())
    }

    async fn load_position(&self, episode_id: &str) -> Result<Option<Duration>> {
        Ok(self.positions.read().get(episode_id).copied())
    }

    async fn clear_position(&self, episode_id: &str) -> Result<()> {
        self.positions.write().remove(episode_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn save_load_clear_roundtrip() {
        let store = MemoryPositionStore::new();
        assert!(store.is_empty());

        store
            .save_position("ep-1", Duration::from_secs(120))
            .await
            .unwrap();
        assert_eq!(
            store.load_position("ep-1").await.unwrap(),
            Some(Duration::from_secs(120))
        );
        assert_eq!(store.load_position("ep-2").await.unwrap(), None);
        assert_eq!(store.len(), 1);

        store.clear_position("ep-1").await.unwrap();
        assert_eq!(store.load_position("ep-1").await.unwrap(), None);
    }

    #[tokio::test]
    async fn save_overwrites_previous_position() {
        let store = MemoryPositionStore::new();
        store
            .save_position("ep-1", Duration::from_secs(10))
            .await
            .unwrap();
        store
            .save_position("ep-1", Duration::from_secs(30))
            .await
            .unwrap();
        assert_eq!(
            store.load_position("ep-1").await.unwrap(),
            Some(Duration::from_secs(30))
        );
        assert_eq!(store.len(), 1);
    }
}
