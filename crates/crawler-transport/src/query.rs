use crawler_aggregate::EventStatus;
use serde::{Deserialize, Serialize};

/// Request shape for `GetModels` (spec §6.4): replay one or more
/// aggregates up to a height, or to their current tip if `filter` is
/// absent. A frontend wires this onto its own transport; nothing in
/// this crate serves it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetModelsQuery {
    pub model_ids: Vec<String>,
    pub filter: Option<GetModelsFilter>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetModelsFilter {
    pub block_height: i64,
}

/// Request shape for `FetchEvents` (spec §6.4): the stored event log
/// for one or more aggregates, optionally windowed and paged.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchEventsQuery {
    pub model_ids: Vec<String>,
    pub filter: Option<FetchEventsFilter>,
    pub paging: Option<Paging>,
    #[serde(default)]
    pub streaming: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FetchEventsFilter {
    pub block_height: Option<i64>,
    pub version: Option<u64>,
    pub status: Option<EventStatus>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Paging {
    pub limit: u32,
    pub offset: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_models_query_round_trips_through_json() {
        let query = GetModelsQuery {
            model_ids: vec!["network".to_string(), "tx-count".to_string()],
            filter: Some(GetModelsFilter { block_height: 800_000 }),
        };

        let json = serde_json::to_string(&query).unwrap();
        let back: GetModelsQuery = serde_json::from_str(&json).unwrap();
        assert_eq!(back.model_ids, query.model_ids);
        assert_eq!(back.filter.unwrap().block_height, 800_000);
    }

    #[test]
    fn fetch_events_query_omits_absent_filter_and_paging() {
        let query = FetchEventsQuery { model_ids: vec!["network".to_string()], filter: None, paging: None, streaming: false };

        let json = serde_json::to_string(&query).unwrap();
        let back: FetchEventsQuery = serde_json::from_str(&json).unwrap();
        assert!(back.filter.is_none());
        assert!(back.paging.is_none());
        assert!(!back.streaming);
    }
}
