//! Interface to the LLM-backed point-of-interest recommendation service.
//!
//! The request payload is exactly the stage model: per-stage endpoints plus
//! the intermediate stop names (with coordinates where known), so the stage
//! boundaries have to stay stable and human-readable.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use sniffertrek_shared::{Coordinate, PoiSuggestion, Stage, Stop};

use crate::stages::names_match;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StopDescription {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coordinates: Option<Coordinate>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageDescription {
    pub index: usize,
    pub origin: String,
    pub destination: String,
    /// Intermediate points along the stage, in travel order.
    pub stops: Vec<StopDescription>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuggestionRequest {
    pub stages: Vec<StageDescription>,
    pub interests: Vec<String>,
    /// Restricts suggestions to one stage when set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stage_index: Option<usize>,
}

#[derive(Debug, thiserror::Error)]
pub enum SuggestionError {
    #[error("recommendation service unreachable: {0}")]
    Http(#[from] reqwest::Error),
    #[error("recommendation service returned an invalid payload: {0}")]
    BadPayload(String),
}

#[async_trait]
pub trait SuggestionProvider: Send + Sync {
    async fn suggest(
        &self,
        request: &SuggestionRequest,
    ) -> Result<Vec<PoiSuggestion>, SuggestionError>;
}

/// Serializes the computed stages into the collaborator request. Intermediate
/// leg endpoints are matched back to plan stops (same fuzzy rule as stage
/// boundaries) to attach coordinates where the plan knows them.
pub fn build_request(
    stages: &[Stage],
    stops: &[Stop],
    interests: Vec<String>,
    stage_index: Option<usize>,
) -> SuggestionRequest {
    let stages = stages
        .iter()
        .map(|stage| {
            let intermediate = stage
                .legs
                .iter()
                .take(stage.legs.len().saturating_sub(1))
                .map(|leg| {
                    let coordinates = stops
                        .iter()
                        .find(|stop| names_match(&leg.destination, &stop.name))
                        .and_then(|stop| stop.coordinates);
                    StopDescription {
                        name: leg.destination.clone(),
                        coordinates,
                    }
                })
                .collect();
            StageDescription {
                index: stage.index,
                origin: stage.origin.clone(),
                destination: stage.destination.clone(),
                stops: intermediate,
            }
        })
        .collect();

    SuggestionRequest {
        stages,
        interests,
        stage_index,
    }
}

/// HTTP adapter for the hosted recommendation endpoint.
pub struct HttpSuggestionProvider {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpSuggestionProvider {
    pub fn new(endpoint: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint,
        }
    }
}

#[derive(Deserialize)]
struct SuggestionBody {
    suggestions: Vec<PoiSuggestion>,
}

#[async_trait]
impl SuggestionProvider for HttpSuggestionProvider {
    async fn suggest(
        &self,
        request: &SuggestionRequest,
    ) -> Result<Vec<PoiSuggestion>, SuggestionError> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(request)
            .send()
            .await?
            .error_for_status()?;
        let body: SuggestionBody = response
            .json()
            .await
            .map_err(|e| SuggestionError::BadPayload(e.to_string()))?;
        Ok(body.suggestions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sniffertrek_shared::{Leg, StopId, StopRole};

    fn leg(origin: &str, destination: &str) -> Leg {
        Leg {
            origin: origin.into(),
            destination: destination.into(),
            distance_m: 1000,
            duration_s: 600,
        }
    }

    #[test]
    fn request_mirrors_stage_structure() {
        let stage = Stage {
            index: 0,
            label: "Stage 1".into(),
            origin: "A".into(),
            destination: "C".into(),
            legs: vec![leg("A", "B"), leg("B", "C")],
            distance_km: 2,
            duration_s: 1200,
            duration: "20 min".into(),
            hotel: None,
        };
        let stops = vec![Stop {
            id: StopId(1),
            name: "B".into(),
            role: StopRole::Waypoint,
            coordinates: Some(Coordinate { lat: 1.0, lng: 2.0 }),
            overnight: false,
            booking: None,
        }];

        let request = build_request(&[stage], &stops, vec!["hiking".into()], Some(0));
        assert_eq!(request.stages.len(), 1);
        assert_eq!(request.stages[0].origin, "A");
        assert_eq!(request.stages[0].destination, "C");
        assert_eq!(request.stages[0].stops.len(), 1);
        assert_eq!(request.stages[0].stops[0].name, "B");
        assert!(request.stages[0].stops[0].coordinates.is_some());
        assert_eq!(request.stage_index, Some(0));
    }

    #[test]
    fn single_leg_stage_has_no_intermediates() {
        let stage = Stage {
            index: 0,
            label: "Stage 1".into(),
            origin: "A".into(),
            destination: "B".into(),
            legs: vec![leg("A", "B")],
            distance_km: 1,
            duration_s: 600,
            duration: "10 min".into(),
            hotel: None,
        };
        let request = build_request(&[stage], &[], Vec::new(), None);
        assert!(request.stages[0].stops.is_empty());
    }
}
