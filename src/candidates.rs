//! Ranked, market-distinct candidate cities around a base city.
//!
//! One city per market (the nearest), ordered by distance then normalized
//! name. A failed or timed-out directory query degrades to an empty list;
//! the pair selector's fallback absorbs the gap.

use std::cmp::Ordering;
use std::collections::HashSet;
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::clamp_radius;
use crate::directory::{self, CityDirectory};
use crate::geo::{distance_miles, within_radius};
use crate::types::City;

/// A nearby city and its distance from the search center.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub city: City,
    pub miles: f64,
    normalized_name: String,
}

impl Candidate {
    fn new(city: City, miles: f64) -> Self {
        let normalized_name = city.normalized_name();
        Self { city, miles, normalized_name }
    }

    fn rank_cmp(&self, other: &Self) -> Ordering {
        self.miles
            .total_cmp(&other.miles)
            .then_with(|| self.normalized_name.cmp(&other.normalized_name))
            .then_with(|| self.city.state_code.cmp(&other.city.state_code))
            .then_with(|| self.city.market_id.cmp(&other.city.market_id))
    }
}

pub struct CandidateFinder<'a, D: CityDirectory + ?Sized> {
    directory: &'a D,
    timeout: Duration,
}

impl<'a, D: CityDirectory + ?Sized> CandidateFinder<'a, D> {
    pub fn new(directory: &'a D, timeout: Duration) -> Self {
        Self { directory, timeout }
    }

    /// Market-distinct candidates within `radius_miles` (capped at 100) of
    /// `center`, excluding `center`'s market and `exclude_market_ids`.
    pub async fn find_candidates(
        &self,
        center: &City,
        radius_miles: f64,
        exclude_market_ids: &HashSet<String>,
    ) -> Vec<Candidate> {
        if !center.is_resolved() {
            debug!(center = %center, "no coordinates, skipping candidate search");
            return Vec::new();
        }

        let radius = clamp_radius(radius_miles);
        let mut excluded = exclude_market_ids.clone();
        if center.has_market() {
            excluded.insert(center.market_id.clone());
        }

        let query = self.directory.find_within_radius(center.coordinate(), radius, &excluded);
        let cities = match directory::with_timeout(self.timeout, query).await {
            Ok(cities) => cities,
            Err(e) => {
                warn!(center = %center, error = %e, "candidate lookup failed, using no candidates");
                return Vec::new();
            }
        };

        let origin = center.coordinate();
        let mut ranked: Vec<Candidate> = cities
            .into_iter()
            .filter(|c| c.has_market() && !excluded.contains(&c.market_id))
            .filter_map(|c| {
                let miles = distance_miles(origin, c.coordinate());
                within_radius(miles, radius).then(|| Candidate::new(c, miles))
            })
            .collect();
        ranked.sort_by(Candidate::rank_cmp);

        let mut seen_markets = HashSet::new();
        ranked.retain(|c| seen_markets.insert(c.city.market_id.clone()));

        debug!(center = %center, radius, found = ranked.len(), "candidates ranked");
        ranked
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::{DirectoryError, InMemoryDirectory};
    use crate::geo::Coordinate;
    use async_trait::async_trait;

    fn city(name: &str, lat: f64, lon: f64, market: &str) -> City {
        City {
            name: name.into(),
            state_code: "IL".into(),
            latitude: lat,
            longitude: lon,
            market_id: market.into(),
            market_name: format!("{} Mkt", market),
        }
    }

    fn center() -> City {
        city("Center", 40.0, -88.0, "HOME")
    }

    const TIMEOUT: Duration = Duration::from_millis(500);

    struct FailingDirectory;

    #[async_trait]
    impl CityDirectory for FailingDirectory {
        async fn find_within_radius(
            &self,
            _center: Coordinate,
            _radius_miles: f64,
            _exclude: &HashSet<String>,
        ) -> Result<Vec<City>, DirectoryError> {
            Err(DirectoryError::Unavailable("connection reset".into()))
        }

        async fn find_by_normalized_name(&self, _name: &str, _state: &str) -> Result<Vec<City>, DirectoryError> {
            Err(DirectoryError::Unavailable("connection reset".into()))
        }
    }

    struct SlowDirectory;

    #[async_trait]
    impl CityDirectory for SlowDirectory {
        async fn find_within_radius(
            &self,
            _center: Coordinate,
            _radius_miles: f64,
            _exclude: &HashSet<String>,
        ) -> Result<Vec<City>, DirectoryError> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(vec![city("Late", 40.1, -88.0, "LATE")])
        }

        async fn find_by_normalized_name(&self, _name: &str, _state: &str) -> Result<Vec<City>, DirectoryError> {
            Ok(vec![])
        }
    }

    /// Ignores the radius and exclusions, returning everything it holds.
    struct SloppyDirectory(Vec<City>);

    #[async_trait]
    impl CityDirectory for SloppyDirectory {
        async fn find_within_radius(
            &self,
            _center: Coordinate,
            _radius_miles: f64,
            _exclude: &HashSet<String>,
        ) -> Result<Vec<City>, DirectoryError> {
            Ok(self.0.clone())
        }

        async fn find_by_normalized_name(&self, _name: &str, _state: &str) -> Result<Vec<City>, DirectoryError> {
            Ok(vec![])
        }
    }

    #[tokio::test]
    async fn test_one_city_per_market_nearest_wins() {
        let dir = InMemoryDirectory::from_cities(vec![
            city("Far A", 40.5, -88.0, "A"),
            city("Near A", 40.1, -88.0, "A"),
            city("B Town", 40.2, -88.0, "B"),
        ]);
        let finder = CandidateFinder::new(&dir, TIMEOUT);
        let found = finder.find_candidates(&center(), 75.0, &HashSet::new()).await;

        let names: Vec<&str> = found.iter().map(|c| c.city.name.as_str()).collect();
        assert_eq!(names, vec!["Near A", "B Town"]);
    }

    #[tokio::test]
    async fn test_excludes_own_and_listed_markets() {
        let dir = InMemoryDirectory::from_cities(vec![
            city("Next Door", 40.05, -88.0, "HOME"),
            city("Skip Me", 40.1, -88.0, "SKIP"),
            city("Keep Me", 40.2, -88.0, "KEEP"),
        ]);
        let finder = CandidateFinder::new(&dir, TIMEOUT);
        let exclude: HashSet<String> = ["SKIP".to_string()].into();
        let found = finder.find_candidates(&center(), 75.0, &exclude).await;

        assert_eq!(found.len(), 1);
        assert_eq!(found[0].city.market_id, "KEEP");
    }

    #[tokio::test]
    async fn test_ties_broken_by_normalized_name() {
        let dir = InMemoryDirectory::from_cities(vec![
            city("Zion", 40.0, -87.7, "Z"),
            city("Mt Baker", 40.0, -88.2, "M"),
            city("Ft. Able", 40.0, -88.2, "F"),
            city("Able", 40.0, -88.2, "A"),
        ]);
        let finder = CandidateFinder::new(&dir, TIMEOUT);
        let found = finder.find_candidates(&center(), 75.0, &HashSet::new()).await;

        let names: Vec<&str> = found.iter().map(|c| c.city.name.as_str()).collect();
        assert_eq!(names, vec!["Able", "Ft. Able", "Mt Baker", "Zion"]);
    }

    #[tokio::test]
    async fn test_radius_capped_at_100() {
        let dir = InMemoryDirectory::from_cities(vec![
            city("Ninety", 41.3, -88.0, "N"),  // ~90 mi
            city("OneTwenty", 41.75, -88.0, "O"), // ~121 mi
        ]);
        let finder = CandidateFinder::new(&dir, TIMEOUT);
        let found = finder.find_candidates(&center(), 500.0, &HashSet::new()).await;
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].city.name, "Ninety");
        assert!(found[0].miles <= 100.0);
    }

    #[tokio::test]
    async fn test_recheck_results_from_directory() {
        let dir = SloppyDirectory(vec![
            city("Own", 40.1, -88.0, "HOME"),
            city("Way Off", 45.0, -88.0, "FAR"),
            city("Broken", f64::NAN, -88.0, "NAN"),
            city("No Market", 40.1, -88.0, ""),
            city("Good", 40.2, -88.0, "GOOD"),
        ]);
        let finder = CandidateFinder::new(&dir, TIMEOUT);
        let found = finder.find_candidates(&center(), 75.0, &HashSet::new()).await;
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].city.name, "Good");
    }

    #[tokio::test]
    async fn test_directory_failure_degrades_to_empty() {
        let finder = CandidateFinder::new(&FailingDirectory, TIMEOUT);
        assert!(finder.find_candidates(&center(), 75.0, &HashSet::new()).await.is_empty());
    }

    #[tokio::test]
    async fn test_directory_timeout_degrades_to_empty() {
        let finder = CandidateFinder::new(&SlowDirectory, Duration::from_millis(20));
        assert!(finder.find_candidates(&center(), 75.0, &HashSet::new()).await.is_empty());
    }

    #[tokio::test]
    async fn test_unresolved_center_has_no_candidates() {
        let dir = InMemoryDirectory::builtin();
        let finder = CandidateFinder::new(&dir, TIMEOUT);
        let ghost = City::unresolved("Nowhere", "IL");
        assert!(finder.find_candidates(&ghost, 100.0, &HashSet::new()).await.is_empty());
    }

    #[tokio::test]
    async fn test_deterministic_order() {
        let dir = InMemoryDirectory::builtin();
        let finder = CandidateFinder::new(&dir, TIMEOUT);
        let chicago = dir.cities()[0].clone();
        let first = finder.find_candidates(&chicago, 100.0, &HashSet::new()).await;
        let second = finder.find_candidates(&chicago, 100.0, &HashSet::new()).await;
        assert!(!first.is_empty());
        assert_eq!(first, second);
    }
}
