//! In-memory city directory, loaded from JSON or the built-in sample set.

use async_trait::async_trait;
use std::collections::HashSet;
use std::fs;
use std::path::Path;

use super::{CityDirectory, DirectoryError};
use crate::geo::{distance_miles, within_radius, Coordinate};
use crate::normalize::normalize;
use crate::types::City;

// ─── Built-in sample set ────────────────────────────────────────

struct BuiltinCity {
    name: &'static str,
    state: &'static str,
    lat: f64,
    lon: f64,
    market_id: &'static str,
    market_name: &'static str,
}

const BUILTIN_CITIES: &[BuiltinCity] = &[
    BuiltinCity { name: "Chicago", state: "IL", lat: 41.8781, lon: -87.6298, market_id: "IL_CHI", market_name: "Chicago Mkt" },
    BuiltinCity { name: "Joliet", state: "IL", lat: 41.5250, lon: -88.0817, market_id: "IL_CHI", market_name: "Chicago Mkt" },
    BuiltinCity { name: "Aurora", state: "IL", lat: 41.7606, lon: -88.3201, market_id: "IL_CHI", market_name: "Chicago Mkt" },
    BuiltinCity { name: "Gary", state: "IN", lat: 41.5934, lon: -87.3464, market_id: "IL_CHI", market_name: "Chicago Mkt" },
    BuiltinCity { name: "Kankakee", state: "IL", lat: 41.1200, lon: -87.8612, market_id: "IL_CHI", market_name: "Chicago Mkt" },
    BuiltinCity { name: "Milwaukee", state: "WI", lat: 43.0389, lon: -87.9065, market_id: "WI_MIL", market_name: "Milwaukee Mkt" },
    BuiltinCity { name: "Kenosha", state: "WI", lat: 42.5847, lon: -87.8212, market_id: "WI_MIL", market_name: "Milwaukee Mkt" },
    BuiltinCity { name: "Rockford", state: "IL", lat: 42.2711, lon: -89.0940, market_id: "IL_ROC", market_name: "Rockford Mkt" },
    BuiltinCity { name: "South Bend", state: "IN", lat: 41.6764, lon: -86.2520, market_id: "IN_SBN", market_name: "South Bend Mkt" },
    BuiltinCity { name: "Fort Wayne", state: "IN", lat: 41.0793, lon: -85.1394, market_id: "IN_FTW", market_name: "Ft Wayne Mkt" },
    BuiltinCity { name: "Indianapolis", state: "IN", lat: 39.7684, lon: -86.1581, market_id: "IN_IND", market_name: "Indianapolis Mkt" },
    BuiltinCity { name: "Lafayette", state: "IN", lat: 40.4167, lon: -86.8753, market_id: "IN_IND", market_name: "Indianapolis Mkt" },
    BuiltinCity { name: "Saint Louis", state: "MO", lat: 38.6270, lon: -90.1994, market_id: "MO_STL", market_name: "St Louis Mkt" },
    BuiltinCity { name: "Saint Charles", state: "MO", lat: 38.7881, lon: -90.4974, market_id: "MO_STL", market_name: "St Louis Mkt" },
    BuiltinCity { name: "Belleville", state: "IL", lat: 38.5201, lon: -89.9840, market_id: "MO_STL", market_name: "St Louis Mkt" },
    BuiltinCity { name: "Columbia", state: "MO", lat: 38.9517, lon: -92.3341, market_id: "MO_COL", market_name: "Columbia Mkt" },
    BuiltinCity { name: "Springfield", state: "IL", lat: 39.7817, lon: -89.6501, market_id: "IL_SPI", market_name: "Springfield Mkt" },
    BuiltinCity { name: "Effingham", state: "IL", lat: 39.1200, lon: -88.5434, market_id: "IL_EFF", market_name: "Effingham Mkt" },
    BuiltinCity { name: "Mount Vernon", state: "IL", lat: 38.3173, lon: -88.9031, market_id: "IL_MTV", market_name: "Mt Vernon Mkt" },
    BuiltinCity { name: "Cape Girardeau", state: "MO", lat: 37.3059, lon: -89.5181, market_id: "MO_CGI", market_name: "Cape Girardeau Mkt" },
    BuiltinCity { name: "Dallas", state: "TX", lat: 32.7767, lon: -96.7970, market_id: "TX_DAL", market_name: "Dallas Mkt" },
    BuiltinCity { name: "Fort Worth", state: "TX", lat: 32.7555, lon: -97.3308, market_id: "TX_DAL", market_name: "Dallas Mkt" },
];

fn builtin_to_city(b: &BuiltinCity) -> City {
    City {
        name: b.name.to_string(),
        state_code: b.state.to_string(),
        latitude: b.lat,
        longitude: b.lon,
        market_id: b.market_id.to_string(),
        market_name: b.market_name.to_string(),
    }
}

// ─── Directory ──────────────────────────────────────────────────

/// A read-only directory held entirely in memory.
#[derive(Debug, Clone, Default)]
pub struct InMemoryDirectory {
    cities: Vec<City>,
}

impl InMemoryDirectory {
    pub fn from_cities(cities: Vec<City>) -> Self {
        Self { cities }
    }

    /// The bundled Midwest/Texas sample set.
    pub fn builtin() -> Self {
        Self::from_cities(BUILTIN_CITIES.iter().map(builtin_to_city).collect())
    }

    /// Parse a JSON array of cities.
    pub fn from_json_str(json: &str) -> Result<Self, serde_json::Error> {
        let cities: Vec<City> = serde_json::from_str(json)?;
        Ok(Self::from_cities(cities))
    }

    /// Load a JSON array of cities from disk.
    pub fn load_from(path: &Path) -> Result<Self, DirectoryError> {
        let data = fs::read_to_string(path).map_err(|e| DirectoryError::Load {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        Self::from_json_str(&data).map_err(|e| DirectoryError::Load {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    pub fn len(&self) -> usize {
        self.cities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cities.is_empty()
    }

    pub fn cities(&self) -> &[City] {
        &self.cities
    }

    fn radius_query(&self, center: Coordinate, radius_miles: f64, exclude: &HashSet<String>) -> Vec<City> {
        self.cities
            .iter()
            .filter(|c| !exclude.contains(&c.market_id))
            .filter(|c| within_radius(distance_miles(center, c.coordinate()), radius_miles))
            .cloned()
            .collect()
    }

    fn name_query(&self, name: &str, state: &str) -> Vec<City> {
        let wanted = normalize(name);
        if wanted.is_empty() {
            return Vec::new();
        }
        let raw = name.trim().to_lowercase();

        let mut matches: Vec<&City> = self
            .cities
            .iter()
            .filter(|c| c.state_code.eq_ignore_ascii_case(state.trim()))
            .filter(|c| c.normalized_name() == wanted)
            .collect();

        // Exact spelling first, then entries with a market, then stable by names.
        matches.sort_by(|a, b| {
            let a_inexact = a.name.to_lowercase() != raw;
            let b_inexact = b.name.to_lowercase() != raw;
            a_inexact
                .cmp(&b_inexact)
                .then_with(|| b.has_market().cmp(&a.has_market()))
                .then_with(|| a.market_name.cmp(&b.market_name))
                .then_with(|| a.name.cmp(&b.name))
        });

        matches.into_iter().cloned().collect()
    }
}

#[async_trait]
impl CityDirectory for InMemoryDirectory {
    async fn find_within_radius(
        &self,
        center: Coordinate,
        radius_miles: f64,
        exclude_market_ids: &HashSet<String>,
    ) -> Result<Vec<City>, DirectoryError> {
        Ok(self.radius_query(center, radius_miles, exclude_market_ids))
    }

    async fn find_by_normalized_name(
        &self,
        name: &str,
        state: &str,
    ) -> Result<Vec<City>, DirectoryError> {
        Ok(self.name_query(name, state))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn chicago() -> Coordinate {
        Coordinate::new(41.8781, -87.6298)
    }

    #[tokio::test]
    async fn test_radius_query() {
        let dir = InMemoryDirectory::builtin();
        let found = dir.find_within_radius(chicago(), 60.0, &HashSet::new()).await.unwrap();
        let names: Vec<&str> = found.iter().map(|c| c.name.as_str()).collect();
        assert!(names.contains(&"Joliet"));
        assert!(names.contains(&"Kenosha"));
        assert!(!names.contains(&"Milwaukee")); // ~81 mi
        assert!(!names.contains(&"Dallas"));
    }

    #[tokio::test]
    async fn test_radius_query_excludes_markets() {
        let dir = InMemoryDirectory::builtin();
        let exclude: HashSet<String> = ["IL_CHI".to_string()].into();
        let found = dir.find_within_radius(chicago(), 60.0, &exclude).await.unwrap();
        assert!(found.iter().all(|c| c.market_id != "IL_CHI"));
        assert!(found.iter().any(|c| c.name == "Kenosha"));
    }

    #[tokio::test]
    async fn test_radius_query_skips_bad_coordinates() {
        let mut cities = InMemoryDirectory::builtin().cities().to_vec();
        cities.push(City {
            name: "Ghost".into(),
            state_code: "IL".into(),
            latitude: f64::NAN,
            longitude: -87.6,
            market_id: "IL_GHO".into(),
            market_name: "Ghost Mkt".into(),
        });
        let dir = InMemoryDirectory::from_cities(cities);
        let found = dir.find_within_radius(chicago(), 100.0, &HashSet::new()).await.unwrap();
        assert!(found.iter().all(|c| c.name != "Ghost"));
    }

    #[tokio::test]
    async fn test_name_query_normalized() {
        let dir = InMemoryDirectory::builtin();
        let found = dir.find_by_normalized_name("Ft. Wayne Mkt", "in").await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].name, "Fort Wayne");

        let found = dir.find_by_normalized_name("St Louis", "MO").await.unwrap();
        assert_eq!(found[0].name, "Saint Louis");
    }

    #[tokio::test]
    async fn test_name_query_wrong_state() {
        let dir = InMemoryDirectory::builtin();
        assert!(dir.find_by_normalized_name("Fort Wayne", "OH").await.unwrap().is_empty());
        assert!(dir.find_by_normalized_name("", "IN").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_name_query_ranks_exact_spelling_first() {
        let json = r#"[
            {"name":"St. Joseph","state_code":"MO","latitude":39.77,"longitude":-94.85,"market_id":"MO_SJ2","market_name":"B"},
            {"name":"Saint Joseph","state_code":"MO","latitude":39.76,"longitude":-94.84,"market_id":"MO_SJ1","market_name":"A"}
        ]"#;
        let dir = InMemoryDirectory::from_json_str(json).unwrap();
        let found = dir.find_by_normalized_name("St. Joseph", "MO").await.unwrap();
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].market_id, "MO_SJ2");

        let found = dir.find_by_normalized_name("St Joseph", "MO").await.unwrap();
        assert_eq!(found[0].market_id, "MO_SJ1"); // no exact spelling: market name order
    }

    #[test]
    fn test_load_from_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("cities.json");
        fs::write(
            &path,
            r#"[{"name":"Tulsa","state_code":"OK","latitude":36.15,"longitude":-95.99,"market_id":"OK_TUL","market_name":"Tulsa Mkt"}]"#,
        )
        .unwrap();
        let dir = InMemoryDirectory::load_from(&path).unwrap();
        assert_eq!(dir.len(), 1);
    }

    #[test]
    fn test_load_from_bad_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("cities.json");
        fs::write(&path, "not json").unwrap();
        assert!(matches!(InMemoryDirectory::load_from(&path), Err(DirectoryError::Load { .. })));
    }
}
