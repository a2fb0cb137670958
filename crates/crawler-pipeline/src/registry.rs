use std::collections::HashMap;

use async_trait::async_trait;
use crawler_aggregate::AggregateOptions;
use crawler_models::{UserModel, UserModelService};

/// One user model the pipeline drives, paired with the persistence
/// options `EventStore::save`/`rollback` apply to it.
pub struct ModelEntry {
    pub model: Box<dyn UserModel>,
    pub options: AggregateOptions,
}

impl ModelEntry {
    pub fn new(model: Box<dyn UserModel>, options: AggregateOptions) -> Self {
        Self { model, options }
    }
}

/// A point-in-time JSON projection of every model in a batch, taken
/// before any of them process the current block. Backs
/// `ModelServices::user_models` (spec §6.1's `services.userModelService`)
/// without borrowing `models` itself, which would otherwise conflict
/// with the mutable borrow `process_block` needs on its own entry.
pub(crate) struct ModelSnapshots(HashMap<String, serde_json::Value>);

impl ModelSnapshots {
    pub(crate) fn capture(models: &[ModelEntry]) -> Self {
        Self(
            models
                .iter()
                .filter_map(|entry| entry.model.to_json_payload().map(|v| (entry.model.aggregate_id().to_string(), v)))
                .collect(),
        )
    }
}

#[async_trait]
impl UserModelService for ModelSnapshots {
    async fn model_snapshot(&self, model_id: &str) -> Option<serde_json::Value> {
        self.0.get(model_id).cloned()
    }
}

#[cfg(test)]
mod tests {
    use crawler_aggregate::{Aggregate, Event};

    use super::*;

    #[derive(Default)]
    struct StubModel;

    #[async_trait]
    impl crawler_models::UserModel for StubModel {
        async fn process_block(&mut self, _ctx: &crawler_models::BlockContext<'_>) -> Result<(), crawler_models::UserModelError> {
            Ok(())
        }

        fn to_json_payload(&self) -> Option<serde_json::Value> {
            Some(serde_json::json!({ "ok": true }))
        }

        fn as_aggregate_mut(&mut self) -> &mut dyn Aggregate {
            self
        }

        fn as_aggregate(&self) -> &dyn Aggregate {
            self
        }
    }

    impl Aggregate for StubModel {
        fn aggregate_id(&self) -> &str {
            "stub"
        }
        fn version(&self) -> u64 {
            0
        }
        fn last_block_height(&self) -> i64 {
            crawler_aggregate::NO_BLOCK_HEIGHT
        }
        fn uncommitted_events(&self) -> &[Event] {
            &[]
        }
        fn handle(&mut self, _event: &Event) -> Result<(), crawler_aggregate::AggregateError> {
            Ok(())
        }
        fn serialize_user_state(&self) -> Result<Vec<u8>, crawler_aggregate::AggregateError> {
            Ok(Vec::new())
        }
        fn restore_user_state(&mut self, _bytes: &[u8]) -> Result<(), crawler_aggregate::AggregateError> {
            Ok(())
        }
        fn reset(&mut self) {}
        fn set_version(&mut self, _version: u64) {}
        fn set_last_block_height(&mut self, _height: i64) {}
        fn push_uncommitted(&mut self, _event: Event) {}
        fn take_uncommitted(&mut self) -> Vec<Event> {
            Vec::new()
        }
    }

    #[tokio::test]
    async fn snapshot_exposes_each_model_s_projection_by_id() {
        let models = vec![ModelEntry::new(Box::new(StubModel), AggregateOptions::default())];
        let snapshots = ModelSnapshots::capture(&models);
        assert_eq!(snapshots.model_snapshot("stub").await, Some(serde_json::json!({ "ok": true })));
        assert_eq!(snapshots.model_snapshot("missing").await, None);
    }
}
