//! City directory: the read-only store the engine queries.
//!
//! The backing store is external; the engine only depends on the
//! [`CityDirectory`] query contract. [`InMemoryDirectory`] is the bundled
//! implementation used by the binary, the HTTP surface, and tests.

pub mod memory;

pub use memory::InMemoryDirectory;

use async_trait::async_trait;
use std::collections::HashSet;
use std::future::Future;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

use crate::geo::Coordinate;
use crate::types::City;

#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error("directory unavailable: {0}")]
    Unavailable(String),
    #[error("directory query timed out after {0} ms")]
    Timeout(u128),
    #[error("cannot load directory from {path}: {reason}")]
    Load { path: PathBuf, reason: String },
}

/// Query contract for the city directory.
#[async_trait]
pub trait CityDirectory: Send + Sync {
    /// Cities within `radius_miles` of `center`, excluding the given markets.
    /// Order is unspecified; callers sort.
    async fn find_within_radius(
        &self,
        center: Coordinate,
        radius_miles: f64,
        exclude_market_ids: &HashSet<String>,
    ) -> Result<Vec<City>, DirectoryError>;

    /// Cities whose normalized name equals `normalize(name)` in `state`,
    /// best match first.
    async fn find_by_normalized_name(
        &self,
        name: &str,
        state: &str,
    ) -> Result<Vec<City>, DirectoryError>;
}

/// Bound a directory call by `limit`, mapping expiry to [`DirectoryError::Timeout`].
pub async fn with_timeout<T, F>(limit: Duration, query: F) -> Result<T, DirectoryError>
where
    F: Future<Output = Result<T, DirectoryError>>,
{
    match tokio::time::timeout(limit, query).await {
        Ok(result) => result,
        Err(_) => Err(DirectoryError::Timeout(limit.as_millis())),
    }
}
