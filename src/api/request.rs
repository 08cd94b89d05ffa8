//! Request types for the shortage engine API.
//!
//! This module defines the JSON request structures for the `/analyze` endpoint.

use serde::{Deserialize, Serialize};

use crate::config::EngineConfig;
use crate::models::PresenceRecord;
use crate::pipeline::Scenario;

/// Name given to the implicit scenario when a request lists none.
pub const DEFAULT_SCENARIO: &str = "default";

/// Request body for the `/analyze` endpoint.
///
/// `config` replaces the server's base configuration for this request.
/// Each entry in `scenarios` may carry its own configuration; entries
/// without one use the request (or base) configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyzeRequest {
    /// Presence records to analyse.
    pub records: Vec<PresenceRecord>,
    /// Configuration for every scenario that does not override it.
    #[serde(default)]
    pub config: Option<EngineConfig>,
    /// Named scenarios to run side by side.
    #[serde(default)]
    pub scenarios: Vec<ScenarioRequest>,
}

/// One scenario in an analyze request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioRequest {
    /// Scenario name.
    pub name: String,
    /// Scenario-specific configuration.
    #[serde(default)]
    pub config: Option<EngineConfig>,
}

impl AnalyzeRequest {
    /// Resolves the scenarios to run against `base`.
    ///
    /// An empty scenario list yields a single [`DEFAULT_SCENARIO`].
    pub fn resolve_scenarios(&self, base: &EngineConfig) -> Vec<Scenario> {
        let shared = self.config.as_ref().unwrap_or(base);
        if self.scenarios.is_empty() {
            return vec![Scenario::new(DEFAULT_SCENARIO, shared.clone())];
        }
        self.scenarios
            .iter()
            .map(|s| Scenario::new(s.name.clone(), s.config.clone().unwrap_or_else(|| shared.clone())))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Statistic;

    #[test]
    fn test_deserialize_minimal_request() {
        let json = r#"{
            "records": [
                {
                    "staff_id": "s-001",
                    "date": "2025-04-01",
                    "slot": "09:00",
                    "role": "nurse",
                    "employment": "full_time",
                    "status": "work"
                }
            ]
        }"#;

        let request: AnalyzeRequest = serde_json::from_str(json).unwrap();
        assert_eq!(request.records.len(), 1);
        assert!(request.config.is_none());
        assert!(request.scenarios.is_empty());
    }

    #[test]
    fn test_deserialize_scenarios_with_partial_config() {
        let json = r#"{
            "records": [],
            "config": {"slots": {"slot_minutes": 60}},
            "scenarios": [
                {"name": "median"},
                {"name": "p75", "config": {"need": {"statistic": "p75"}}}
            ]
        }"#;

        let request: AnalyzeRequest = serde_json::from_str(json).unwrap();
        let scenarios = request.resolve_scenarios(&EngineConfig::default());

        assert_eq!(scenarios.len(), 2);
        assert_eq!(scenarios[0].config.slots.slot_minutes, 60);
        assert_eq!(scenarios[1].config.need.statistic, Statistic::Percentile(75.0));
        // a scenario config replaces the request config entirely
        assert_eq!(scenarios[1].config.slots.slot_minutes, 30);
    }

    #[test]
    fn test_empty_scenarios_resolve_to_default() {
        let request = AnalyzeRequest {
            records: Vec::new(),
            config: None,
            scenarios: Vec::new(),
        };
        let mut base = EngineConfig::default();
        base.need.statistic = Statistic::Mean;

        let scenarios = request.resolve_scenarios(&base);
        assert_eq!(scenarios.len(), 1);
        assert_eq!(scenarios[0].name, DEFAULT_SCENARIO);
        assert_eq!(scenarios[0].config.need.statistic, Statistic::Mean);
    }

    #[test]
    fn test_unknown_statistic_fails_to_deserialize() {
        let json = r#"{"records": [], "config": {"need": {"statistic": "mode"}}}"#;
        let result: Result<AnalyzeRequest, _> = serde_json::from_str(json);
        let message = result.unwrap_err().to_string();
        assert!(message.contains("Invalid configuration"), "{}", message);
    }
}
