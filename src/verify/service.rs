//! The single wrapper around a geocode verifier: cache, per-call timeout,
//! at most one retry, and failure that never propagates.

use serde::Serialize;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::{GeocodeData, GeocodeVerifier, Verification, VerificationCache, VerifyError};
use crate::config::{EngineConfig, MAX_VERIFY_RETRIES};
use crate::geo::{distance_miles, Coordinate};
use crate::types::City;

/// Directory and geocoder coordinates further apart than this are suspect.
pub const MAX_AGREEMENT_MILES: f64 = 10.0;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum VerificationStatus {
    Verified(GeocodeData),
    NotVerified,
    /// The verifier failed or timed out; directory data stands unannotated.
    Unavailable,
}

/// Confidence annotation for a directory entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Confidence {
    High,
    Low,
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Annotation {
    pub city: String,
    pub state: String,
    pub confidence: Confidence,
    /// Directory-to-geocoder distance, when both are known.
    pub drift_miles: Option<f64>,
}

pub struct VerificationService<V: GeocodeVerifier> {
    verifier: V,
    cache: Mutex<VerificationCache>,
    timeout: Duration,
    retries: u32,
    min_interval: Duration,
}

impl<V: GeocodeVerifier> VerificationService<V> {
    pub fn new(verifier: V, cache: VerificationCache, timeout: Duration, retries: u32) -> Self {
        Self {
            verifier,
            cache: Mutex::new(cache),
            timeout,
            retries: retries.min(MAX_VERIFY_RETRIES),
            min_interval: Duration::ZERO,
        }
    }

    pub fn from_config(verifier: V, cache: VerificationCache, config: &EngineConfig) -> Self {
        Self::new(verifier, cache, config.verify_timeout(), config.verify_retries())
            .with_min_interval(config.verify_min_interval())
    }

    /// Spacing between uncached calls in background annotation runs.
    pub fn with_min_interval(mut self, interval: Duration) -> Self {
        self.min_interval = interval;
        self
    }

    pub fn clear_cache(&self) {
        if let Ok(mut cache) = self.cache.lock() {
            cache.clear();
        }
    }

    fn cached(&self, city: &str, state: &str) -> Option<Verification> {
        self.cache.lock().ok()?.get(city, state)
    }

    fn remember(&self, city: &str, state: &str, verification: &Verification) {
        if let Ok(mut cache) = self.cache.lock() {
            cache.put(city, state, verification);
        }
    }

    async fn attempt(&self, city: &str, state: &str, zip: Option<&str>) -> Result<Verification, VerifyError> {
        match tokio::time::timeout(self.timeout, self.verifier.verify(city, state, zip)).await {
            Ok(result) => result,
            Err(_) => Err(VerifyError::Timeout),
        }
    }

    /// Verify a place. Never fails: an unreachable verifier yields
    /// [`VerificationStatus::Unavailable`], which is not cached.
    pub async fn verify(&self, city: &str, state: &str, zip: Option<&str>) -> VerificationStatus {
        self.verify_tracked(city, state, zip).await.0
    }

    /// Status plus whether the verifier was actually called.
    async fn verify_tracked(&self, city: &str, state: &str, zip: Option<&str>) -> (VerificationStatus, bool) {
        if let Some(hit) = self.cached(city, state) {
            debug!(city, state, "verification cache hit");
            return (status_of(hit), false);
        }

        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.attempt(city, state, zip).await {
                Ok(verification) => {
                    self.remember(city, state, &verification);
                    return (status_of(verification), true);
                }
                Err(e) if e.is_transient() && attempt <= self.retries => {
                    debug!(city, state, attempt, error = %e, "verification failed, retrying");
                }
                Err(e) => {
                    warn!(city, state, attempt, error = %e, "verification unavailable");
                    return (VerificationStatus::Unavailable, true);
                }
            }
        }
    }

    /// Compare a directory entry against the geocoder.
    pub async fn annotate(&self, city: &City) -> Annotation {
        self.annotate_tracked(city).await.0
    }

    async fn annotate_tracked(&self, city: &City) -> (Annotation, bool) {
        let (status, called) = self.verify_tracked(&city.name, &city.state_code, None).await;
        let (confidence, drift_miles) = match &status {
            VerificationStatus::Verified(data) => {
                let drift = distance_miles(city.coordinate(), Coordinate::new(data.lat, data.lon));
                if drift.is_finite() {
                    let confidence = if drift <= MAX_AGREEMENT_MILES { Confidence::High } else { Confidence::Low };
                    (confidence, Some(drift))
                } else {
                    (Confidence::Low, None)
                }
            }
            VerificationStatus::NotVerified => (Confidence::Low, None),
            VerificationStatus::Unavailable => (Confidence::Unknown, None),
        };
        let annotation = Annotation {
            city: city.name.clone(),
            state: city.state_code.clone(),
            confidence,
            drift_miles,
        };
        (annotation, called)
    }
}

impl<V: GeocodeVerifier + 'static> VerificationService<V> {
    /// Annotate `cities` on a background task. Selection never awaits this.
    pub fn annotate_in_background(self: Arc<Self>, cities: Vec<City>) -> JoinHandle<Vec<Annotation>> {
        tokio::spawn(async move {
            let mut annotations = Vec::with_capacity(cities.len());
            for city in &cities {
                let (annotation, called) = self.annotate_tracked(city).await;
                annotations.push(annotation);
                if called && !self.min_interval.is_zero() {
                    tokio::time::sleep(self.min_interval).await;
                }
            }
            debug!(count = annotations.len(), "background annotation finished");
            annotations
        })
    }
}

fn status_of(verification: Verification) -> VerificationStatus {
    match (verification.verified, verification.data) {
        (true, Some(data)) => VerificationStatus::Verified(data),
        _ => VerificationStatus::NotVerified,
    }
}
