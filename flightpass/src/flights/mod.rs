//! Flight records looked up by decoded code.

use std::collections::HashMap;
use std::path::Path;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::info;

use crate::error::{FlightpassError, Result};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Flight {
    pub flight_number: String,
    #[serde(default)]
    pub flight_id: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub departure_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arrival_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub departure_airport: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arrival_airport: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flight_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub airline: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arrived: Option<bool>,
    /// URI of the stored boarding pass image.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub boarding_pass: Option<String>,
}

impl Flight {
    pub fn new(flight_number: impl Into<String>) -> Self {
        Self {
            flight_number: flight_number.into(),
            flight_id: 0,
            departure_time: None,
            arrival_time: None,
            departure_airport: None,
            arrival_airport: None,
            flight_type: None,
            airline: None,
            arrived: None,
            boarding_pass: None,
        }
    }
}

#[async_trait]
pub trait FlightStore: Send + Sync {
    async fn find_by_code(&self, code: &str) -> Result<Option<Flight>>;

    /// Record where the flight's boarding pass is stored.
    async fn attach_boarding_pass(&self, flight_number: &str, uri: &str) -> Result<()>;
}

/// Canonical lookup key: whitespace removed, upper-cased.
pub fn normalize_code(code: &str) -> String {
    code.chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_uppercase)
        .collect()
}

/// Flight records held in memory, keyed by normalized flight number.
#[derive(Debug, Default)]
pub struct InMemoryFlightStore {
    flights: RwLock<HashMap<String, Flight>>,
}

impl InMemoryFlightStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_flights(flights: impl IntoIterator<Item = Flight>) -> Self {
        let flights = flights
            .into_iter()
            .map(|flight| (normalize_code(&flight.flight_number), flight))
            .collect();
        Self {
            flights: RwLock::new(flights),
        }
    }

    /// Load a JSON array of flight records.
    pub async fn load_seed(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = tokio::fs::read(path).await?;
        let flights: Vec<Flight> = serde_json::from_slice(&raw)?;

        if let Some(bad) = flights.iter().find(|f| normalize_code(&f.flight_number).is_empty()) {
            return Err(FlightpassError::Validation(format!(
                "Flight record with empty flight number in {}: {:?}",
                path.display(),
                bad
            )));
        }

        info!(path = %path.display(), count = flights.len(), "Loaded flight records");
        Ok(Self::from_flights(flights))
    }

    pub async fn len(&self) -> usize {
        self.flights.read().await.len()
    }
}

#[async_trait]
impl FlightStore for InMemoryFlightStore {
    async fn find_by_code(&self, code: &str) -> Result<Option<Flight>> {
        let key = normalize_code(code);
        Ok(self.flights.read().await.get(&key).cloned())
    }

    async fn attach_boarding_pass(&self, flight_number: &str, uri: &str) -> Result<()> {
        let key = normalize_code(flight_number);
        let mut flights = self.flights.write().await;
        let flight = flights
            .get_mut(&key)
            .ok_or_else(|| FlightpassError::NotFound(format!("Flight {flight_number} not found")))?;
        flight.boarding_pass = Some(uri.to_string());
        Ok(())
    }
}
