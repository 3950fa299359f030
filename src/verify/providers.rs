//! Geocode verification via OpenStreetMap Nominatim.

use async_trait::async_trait;
use serde::Deserialize;
use std::io;
use std::time::Duration;

use super::{GeocodeData, GeocodeVerifier, Verification, VerifyError};
use crate::normalize::normalize;

const NOMINATIM_SEARCH: &str = "https://nominatim.openstreetmap.org/search";
const USER_AGENT: &str = "LaneAlternates/0.3 (freight-lane-verifier)";

#[derive(Deserialize, Debug, Clone)]
struct NominatimPlace {
    lat: String,
    lon: String,
    display_name: String,
    #[serde(default)]
    address: Option<NominatimAddress>,
}

#[derive(Deserialize, Debug, Clone, Default)]
struct NominatimAddress {
    #[serde(default)]
    city: Option<String>,
    #[serde(default)]
    town: Option<String>,
    #[serde(default)]
    village: Option<String>,
    #[serde(default)]
    postcode: Option<String>,
}

impl NominatimAddress {
    fn locality(&self) -> Option<&str> {
        self.city
            .as_deref()
            .or(self.town.as_deref())
            .or(self.village.as_deref())
    }
}

/// Structured US search against Nominatim. Blocking HTTP runs on the
/// blocking pool so callers stay async.
#[derive(Debug, Clone)]
pub struct NominatimVerifier {
    base_url: String,
    timeout: Duration,
}

impl NominatimVerifier {
    pub fn new(timeout: Duration) -> Self {
        Self {
            base_url: NOMINATIM_SEARCH.to_string(),
            timeout,
        }
    }

    /// Point at a different Nominatim-compatible endpoint.
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    fn search_url(&self, city: &str, state: &str, zip: Option<&str>) -> String {
        let zip_param = match zip {
            Some(z) if !z.trim().is_empty() => format!("&postalcode={}", encode_component(z.trim())),
            _ => String::new(),
        };
        format!(
            "{}?city={}&state={}&countrycodes=us&format=json&limit=1&addressdetails=1{}",
            self.base_url,
            encode_component(city.trim()),
            encode_component(state.trim()),
            zip_param,
        )
    }
}

#[async_trait]
impl GeocodeVerifier for NominatimVerifier {
    async fn verify(&self, city: &str, state: &str, zip: Option<&str>) -> Result<Verification, VerifyError> {
        let url = self.search_url(city, state, zip);
        let timeout = self.timeout;
        let places = tokio::task::spawn_blocking(move || fetch_places(&url, timeout))
            .await
            .map_err(|e| VerifyError::Network(e.to_string()))??;
        Ok(interpret(city, &places))
    }
}

fn fetch_places(url: &str, timeout: Duration) -> Result<Vec<NominatimPlace>, VerifyError> {
    let response = ureq::get(url)
        .set("User-Agent", USER_AGENT)
        .timeout(timeout)
        .call()
        .map_err(|e| match e {
            ureq::Error::Transport(t) => transport_error(&t),
            other => VerifyError::Network(other.to_string()),
        })?;

    response
        .into_json()
        .map_err(|e| VerifyError::InvalidResponse(e.to_string()))
}

/// Only an I/O timeout counts as [`VerifyError::Timeout`]; refused or reset
/// connections, DNS failures and the like are network errors.
fn transport_error(t: &ureq::Transport) -> VerifyError {
    let io_kind = std::error::Error::source(t)
        .and_then(|source| source.downcast_ref::<io::Error>())
        .map(io::Error::kind);
    classify(io_kind, t.to_string())
}

fn classify(io_kind: Option<io::ErrorKind>, detail: String) -> VerifyError {
    match io_kind {
        Some(io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock) => VerifyError::Timeout,
        _ => VerifyError::Network(detail),
    }
}

/// Verified when the top hit's locality (or first display-name component)
/// normalizes to the queried city.
fn interpret(city: &str, places: &[NominatimPlace]) -> Verification {
    let Some(top) = places.first() else {
        return Verification::not_found();
    };
    let (Ok(lat), Ok(lon)) = (top.lat.parse::<f64>(), top.lon.parse::<f64>()) else {
        return Verification::not_found();
    };

    let address = top.address.clone().unwrap_or_default();
    let reported = address
        .locality()
        .map(str::to_string)
        .unwrap_or_else(|| top.display_name.split(',').next().unwrap_or("").trim().to_string());

    Verification {
        verified: !reported.is_empty() && normalize(&reported) == normalize(city),
        data: Some(GeocodeData {
            lat,
            lon,
            market_id: None,
            display_name: Some(top.display_name.clone()),
            postcode: address.postcode,
        }),
    }
}

// ─── URL encoding (query components only) ───────────────────────

fn encode_component(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for b in s.bytes() {
        match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => out.push(b as char),
            b' ' => out.push_str("%20"),
            _ => out.push_str(&format!("%{:02X}", b)),
        }
    }
    out
}
