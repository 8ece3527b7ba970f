//! Resource Contracts (C3, §4.3): persists the [`SnoopContract`] FSM to the
//! shared store, maintains the double index, and runs the stuck-in-
//! `WAITING_AST` watchdog diagnostic.

use std::sync::Arc;
use std::time::Duration;

use tracing::warn;
use voicebot_core::domain::{SnoopContract, SnoopState, SnoopTransitionError};
use voicebot_core::ports::{SharedStorePort, StoreError};

fn snoop_key(linked_id: &str) -> String {
    format!("snoop:{linked_id}")
}

fn snoop_by_id_key(snoop_id: &str) -> String {
    format!("snoop:by-id:{snoop_id}")
}

/// Diagnostic-only threshold: a contract parked in `WAITING_AST` longer than
/// this is logged but never force-transitioned (§4.3 step 4).
const WAITING_AST_STUCK_THRESHOLD_MS: i64 = 2_000;

pub struct SnoopContracts {
    store: Arc<dyn SharedStorePort>,
}

impl SnoopContracts {
    #[must_use]
    pub fn new(store: Arc<dyn SharedStorePort>) -> Self {
        Self { store }
    }

    async fn load(&self, linked_id: &str) -> Result<Option<SnoopContract>, StoreError> {
        let Some(raw) = self.store.get(&snoop_key(linked_id)).await? else {
            return Ok(None);
        };
        serde_json::from_str(&raw).map(Some).map_err(|e| StoreError::Serialization(e.to_string()))
    }

    async fn save(&self, contract: &SnoopContract) -> Result<(), StoreError> {
        let raw = serde_json::to_string(contract).map_err(|e| StoreError::Serialization(e.to_string()))?;
        let ttl = Duration::from_millis(contract.ttl_ms);
        self.store.set_px(&snoop_key(&contract.linked_id), &raw, ttl).await?;
        self.store.set_px(&snoop_by_id_key(&contract.snoop_id), &contract.linked_id, ttl).await
    }

    /// Creates and persists a fresh contract in `CREATED`.
    pub async fn create(&self, linked_id: &str, snoop_id: &str, parent_channel_id: &str, now_ms: i64) -> Result<SnoopContract, StoreError> {
        let contract = SnoopContract::new(linked_id, snoop_id, parent_channel_id, now_ms);
        self.save(&contract).await?;
        Ok(contract)
    }

    #[must_use]
    pub async fn get(&self, linked_id: &str) -> Result<Option<SnoopContract>, StoreError> {
        self.load(linked_id).await
    }

    /// Applies the §4.3 transition algorithm and persists the result,
    /// refreshing both index keys. The watchdog check is run inline here
    /// since the store is the contract's only durable home.
    pub async fn transition(
        &self,
        linked_id: &str,
        expected_from: SnoopState,
        target: SnoopState,
        now_ms: i64,
    ) -> Result<SnoopContract, SnoopTransitionError> {
        let mut contract = match self.load(linked_id).await {
            Ok(Some(c)) => c,
            _ => return Err(SnoopTransitionError::Forbidden { from: SnoopState::Destroyed, to: target }),
        };

        if contract.state == SnoopState::WaitingAst && now_ms - contract.created_at_ms > WAITING_AST_STUCK_THRESHOLD_MS {
            warn!(call = linked_id, age_ms = now_ms - contract.created_at_ms, "snoop contract stuck in WAITING_AST");
        }

        contract.transition(expected_from, target, now_ms)?;
        let _ = self.save(&contract).await;
        Ok(contract)
    }

    /// Destroys the contract and removes both index keys (§8 property 10).
    pub async fn destroy(&self, linked_id: &str, now_ms: i64) -> Result<(), StoreError> {
        if let Some(mut contract) = self.load(linked_id).await? {
            let _ = contract.transition(contract.state, SnoopState::Destroyed, now_ms);
            let snoop_id = contract.snoop_id.clone();
            self.store.del(&snoop_key(linked_id)).await?;
            self.store.del(&snoop_by_id_key(&snoop_id)).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use std::collections::HashMap;

    #[derive(Default)]
    struct FakeStore {
        data: Mutex<HashMap<String, String>>,
    }

    #[async_trait]
    impl SharedStorePort for FakeStore {
        async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
            Ok(self.data.lock().unwrap().get(key).cloned())
        }
        async fn set_px(&self, key: &str, value: &str, _ttl: Duration) -> Result<(), StoreError> {
            self.data.lock().unwrap().insert(key.to_string(), value.to_string());
            Ok(())
        }
        async fn del(&self, key: &str) -> Result<(), StoreError> {
            self.data.lock().unwrap().remove(key);
            Ok(())
        }
        async fn rpush(&self, _key: &str, _value: &str) -> Result<(), StoreError> {
            Ok(())
        }
        async fn lrange(&self, _key: &str, _start: i64, _stop: i64) -> Result<Vec<String>, StoreError> {
            Ok(Vec::new())
        }
        async fn expire(&self, _key: &str, _ttl: Duration) -> Result<(), StoreError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn create_then_transition_round_trips_through_the_store() {
        let store = Arc::new(FakeStore::default());
        let contracts = SnoopContracts::new(store);
        contracts.create("call-1", "snoop-1", "chan-1", 0).await.unwrap();
        let updated = contracts.transition("call-1", SnoopState::Created, SnoopState::Ready, 10).await.unwrap();
        assert_eq!(updated.state, SnoopState::Ready);
        assert!(contracts.get("call-1").await.unwrap().unwrap().is_ready());
    }

    #[tokio::test]
    async fn destroy_removes_both_index_keys() {
        let store = Arc::new(FakeStore::default());
        let contracts = SnoopContracts::new(store.clone());
        contracts.create("call-1", "snoop-1", "chan-1", 0).await.unwrap();
        contracts.destroy("call-1", 100).await.unwrap();
        assert!(store.get(&snoop_key("call-1")).await.unwrap().is_none());
        assert!(store.get(&snoop_by_id_key("snoop-1")).await.unwrap().is_none());
    }
}
