//! Persistence seam for the journey document.
//!
//! The store owns the durable `{ "current_goals": [...] }` document. Reads
//! hand back raw JSON for the normalizer; writes replace the
//! `current_goals` key and leave any other top-level keys alone. Errors
//! carry no taxonomy, so callers treat every `Err` the same way.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::model::Journey;

mod file;
mod memory;

pub use file::FileJourneyStore;
pub use memory::MemoryJourneyStore;

pub const CURRENT_GOALS_KEY: &str = "current_goals";

#[async_trait]
pub trait JourneyStore: Send + Sync {
    /// Fetch the raw document.
    async fn get_journey(&self) -> anyhow::Result<Value>;

    /// Replace `current_goals` with the given goals.
    async fn update_journey(&self, journey: &Journey) -> anyhow::Result<()>;
}

#[async_trait]
impl<S> JourneyStore for Arc<S>
where
    S: JourneyStore + ?Sized,
{
    async fn get_journey(&self) -> anyhow::Result<Value> {
        (**self).get_journey().await
    }

    async fn update_journey(&self, journey: &Journey) -> anyhow::Result<()> {
        (**self).update_journey(journey).await
    }
}

#[async_trait]
impl<S> JourneyStore for &S
where
    S: JourneyStore + ?Sized,
{
    async fn get_journey(&self) -> anyhow::Result<Value> {
        (**self).get_journey().await
    }

    async fn update_journey(&self, journey: &Journey) -> anyhow::Result<()> {
        (**self).update_journey(journey).await
    }
}

/// Document with no goals.
pub fn empty_document() -> Value {
    let mut map = Map::new();
    map.insert(CURRENT_GOALS_KEY.to_string(), Value::Array(Vec::new()));
    Value::Object(map)
}

/// Write the goals of `journey` into `document`, keeping its other keys.
/// A document that is not an object is replaced outright.
pub(crate) fn merge_goals(document: &mut Value, journey: &Journey) -> serde_json::Result<()> {
    let goals = serde_json::to_value(&journey.current_goals)?;
    match document {
        Value::Object(map) => {
            map.insert(CURRENT_GOALS_KEY.to_string(), goals);
        }
        other => {
            let mut map = Map::new();
            map.insert(CURRENT_GOALS_KEY.to_string(), goals);
            *other = Value::Object(map);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Goal;
    use serde_json::json;

    #[test]
    fn merge_keeps_unrelated_keys() {
        let mut document = json!({ "current_goals": [], "habits": [1, 2] });
        let journey = Journey::new(vec![Goal::new("g1", "Goal")]);
        merge_goals(&mut document, &journey).expect("merge");
        assert_eq!(document["habits"], json!([1, 2]));
        assert_eq!(document["current_goals"][0]["id"], "g1");
    }

    #[test]
    fn merge_replaces_non_object_document() {
        let mut document = json!("garbage");
        merge_goals(&mut document, &Journey::default()).expect("merge");
        assert_eq!(document, empty_document());
    }
}
