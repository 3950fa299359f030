//! Optional geocode verification of directory entries.
//!
//! Advisory only: results annotate directory confidence for maintenance and
//! never feed back into pair selection.

pub mod cache;
pub mod providers;
pub mod service;

pub use cache::VerificationCache;
pub use providers::NominatimVerifier;
pub use service::{Annotation, Confidence, VerificationService, VerificationStatus};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VerifyError {
    #[error("network error: {0}")]
    Network(String),
    #[error("invalid geocoder response: {0}")]
    InvalidResponse(String),
    #[error("geocoder timed out")]
    Timeout,
}

impl VerifyError {
    /// Worth one more attempt.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Network(_) | Self::Timeout)
    }
}

/// Coordinates and metadata the geocoder reported for a place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeocodeData {
    pub lat: f64,
    pub lon: f64,
    #[serde(default)]
    pub market_id: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub postcode: Option<String>,
}

/// What the geocoder said about a city/state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Verification {
    pub verified: bool,
    #[serde(default)]
    pub data: Option<GeocodeData>,
}

impl Verification {
    pub fn not_found() -> Self {
        Self { verified: false, data: None }
    }
}

#[async_trait]
pub trait GeocodeVerifier: Send + Sync {
    async fn verify(&self, city: &str, state: &str, zip: Option<&str>) -> Result<Verification, VerifyError>;
}
