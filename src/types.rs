//! Core record types: cities, lanes, and pair sequences.

use crate::geo::Coordinate;
use crate::normalize::normalize;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// A directory city. Reference data, never mutated by the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct City {
    pub name: String,
    pub state_code: String,
    pub latitude: f64,
    pub longitude: f64,
    /// Freight market (KMA) identifier. Empty when unknown.
    #[serde(default)]
    pub market_id: String,
    #[serde(default)]
    pub market_name: String,
}

impl City {
    /// Placeholder for a lane end the directory could not resolve.
    /// Its coordinates are non-finite, so it is never inside any radius.
    pub fn unresolved(name: &str, state_code: &str) -> Self {
        Self {
            name: name.trim().to_string(),
            state_code: state_code.trim().to_uppercase(),
            latitude: f64::NAN,
            longitude: f64::NAN,
            market_id: String::new(),
            market_name: String::new(),
        }
    }

    pub fn coordinate(&self) -> Coordinate {
        Coordinate::new(self.latitude, self.longitude)
    }

    pub fn normalized_name(&self) -> String {
        normalize(&self.name)
    }

    pub fn is_resolved(&self) -> bool {
        self.coordinate().is_finite()
    }

    pub fn has_market(&self) -> bool {
        !self.market_id.is_empty()
    }
}

impl fmt::Display for City {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}, {}", self.name, self.state_code)
    }
}

/// Errors that escape lane processing.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LaneError {
    /// A required lane field is missing or blank, or a value is out of range.
    #[error("invalid lane input: {field} is missing or out of range")]
    InvalidLaneInput { field: &'static str },
    /// The task processing the lane panicked or was cancelled.
    #[error("lane processing aborted: {0}")]
    Aborted(String),
}

/// A lane exactly as it arrives from import or user input.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LaneInput {
    pub origin_city: Option<String>,
    pub origin_state: Option<String>,
    pub dest_city: Option<String>,
    pub dest_state: Option<String>,
    pub equipment_code: Option<String>,
    pub weight: Option<f64>,
    /// Selects the "fill" quota.
    pub prefer_fill_target: bool,
    /// Explicit alternate count; wins over `prefer_fill_target`.
    pub target_alternates: Option<usize>,
}

/// How many alternates a lane asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AlternateTarget {
    /// Use the configured fill quota.
    Fill,
    /// Use the configured default quota.
    Default,
    /// Exactly this many.
    Count(usize),
}

/// A validated lane. Only obtainable through `Lane::try_from(LaneInput)`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Lane {
    origin_city: String,
    origin_state: String,
    dest_city: String,
    dest_state: String,
    equipment_code: String,
    weight: Option<f64>,
    target: AlternateTarget,
}

impl Lane {
    pub fn origin_city(&self) -> &str {
        &self.origin_city
    }

    pub fn origin_state(&self) -> &str {
        &self.origin_state
    }

    pub fn dest_city(&self) -> &str {
        &self.dest_city
    }

    pub fn dest_state(&self) -> &str {
        &self.dest_state
    }

    pub fn equipment_code(&self) -> &str {
        &self.equipment_code
    }

    pub fn weight(&self) -> Option<f64> {
        self.weight
    }

    pub fn target(&self) -> AlternateTarget {
        self.target
    }
}

impl fmt::Display for Lane {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}, {} -> {}, {}",
            self.origin_city, self.origin_state, self.dest_city, self.dest_state
        )
    }
}

fn required(value: Option<String>, field: &'static str) -> Result<String, LaneError> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v.trim().to_string()),
        _ => Err(LaneError::InvalidLaneInput { field }),
    }
}

impl TryFrom<LaneInput> for Lane {
    type Error = LaneError;

    fn try_from(input: LaneInput) -> Result<Self, Self::Error> {
        let origin_city = required(input.origin_city, "origin_city")?;
        let origin_state = required(input.origin_state, "origin_state")?.to_uppercase();
        let dest_city = required(input.dest_city, "dest_city")?;
        let dest_state = required(input.dest_state, "dest_state")?.to_uppercase();

        let target = match (input.target_alternates, input.prefer_fill_target) {
            (Some(k), _) => AlternateTarget::Count(k),
            (None, true) => AlternateTarget::Fill,
            (None, false) => AlternateTarget::Default,
        };

        Ok(Self {
            origin_city,
            origin_state,
            dest_city,
            dest_state,
            equipment_code: input.equipment_code.unwrap_or_default().trim().to_uppercase(),
            weight: input.weight.filter(|w| w.is_finite()),
            target,
        })
    }
}

/// Which branch produced a pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PairKind {
    /// The lane's own origin/destination.
    Base,
    /// Nearby candidates on both sides.
    Diverse,
    /// Origin candidates ran out; base origin reused.
    OriginFallback,
    /// Destination candidates ran out; base destination reused.
    DestFallback,
    /// Both sides ran out; a repeat of the base pair.
    FullFallback,
}

impl PairKind {
    pub fn is_fallback(&self) -> bool {
        matches!(self, Self::OriginFallback | Self::DestFallback | Self::FullFallback)
    }
}

/// One origin/destination pair with distances from the lane's base cities.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CandidatePair {
    pub origin: City,
    pub dest: City,
    pub origin_miles: f64,
    pub dest_miles: f64,
    pub kind: PairKind,
}

/// Base pair followed by exactly `K` alternates.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PairSequence {
    pairs: Vec<CandidatePair>,
}

impl PairSequence {
    pub(crate) fn new(base: CandidatePair, alternates: Vec<CandidatePair>) -> Self {
        let mut pairs = Vec::with_capacity(alternates.len() + 1);
        pairs.push(base);
        pairs.extend(alternates);
        Self { pairs }
    }

    pub fn base(&self) -> &CandidatePair {
        &self.pairs[0]
    }

    pub fn alternates(&self) -> &[CandidatePair] {
        &self.pairs[1..]
    }

    /// Always `K + 1`.
    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn iter(&self) -> std::slice::Iter<'_, CandidatePair> {
        self.pairs.iter()
    }

    pub fn fallback_count(&self) -> usize {
        self.pairs.iter().filter(|p| p.kind.is_fallback()).count()
    }
}

impl<'a> IntoIterator for &'a PairSequence {
    type Item = &'a CandidatePair;
    type IntoIter = std::slice::Iter<'a, CandidatePair>;

    fn into_iter(self) -> Self::IntoIter {
        self.pairs.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input() -> LaneInput {
        LaneInput {
            origin_city: Some("Fort Wayne".into()),
            origin_state: Some("in".into()),
            dest_city: Some("Saint Louis".into()),
            dest_state: Some("MO".into()),
            equipment_code: Some("fd".into()),
            weight: Some(42000.0),
            prefer_fill_target: false,
            target_alternates: None,
        }
    }

    #[test]
    fn test_valid_lane() {
        let lane = Lane::try_from(input()).unwrap();
        assert_eq!(lane.origin_state(), "IN");
        assert_eq!(lane.equipment_code(), "FD");
        assert_eq!(lane.target(), AlternateTarget::Default);
        assert_eq!(lane.to_string(), "Fort Wayne, IN -> Saint Louis, MO");
    }

    #[test]
    fn test_missing_dest_city() {
        let mut raw = input();
        raw.dest_city = None;
        assert_eq!(
            Lane::try_from(raw),
            Err(LaneError::InvalidLaneInput { field: "dest_city" })
        );
    }

    #[test]
    fn test_blank_origin_state() {
        let mut raw = input();
        raw.origin_state = Some("  ".into());
        assert_eq!(
            Lane::try_from(raw),
            Err(LaneError::InvalidLaneInput { field: "origin_state" })
        );
    }

    #[test]
    fn test_target_resolution() {
        let mut raw = input();
        raw.prefer_fill_target = true;
        assert_eq!(Lane::try_from(raw.clone()).unwrap().target(), AlternateTarget::Fill);
        raw.target_alternates = Some(3);
        assert_eq!(Lane::try_from(raw).unwrap().target(), AlternateTarget::Count(3));
    }

    #[test]
    fn test_lane_input_from_json_defaults() {
        let raw: LaneInput = serde_json::from_str(
            r#"{"origin_city":"Dallas","origin_state":"TX","dest_city":"Tulsa","dest_state":"OK"}"#,
        )
        .unwrap();
        assert!(!raw.prefer_fill_target);
        assert!(raw.weight.is_none());
        assert!(Lane::try_from(raw).is_ok());
    }

    #[test]
    fn test_unresolved_city() {
        let city = City::unresolved(" Nowhere ", "ks");
        assert!(!city.is_resolved());
        assert!(!city.has_market());
        assert_eq!(city.to_string(), "Nowhere, KS");
    }
}
