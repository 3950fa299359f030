//! Pair selection with an exact alternate quota.
//!
//! Output is always the base pair followed by exactly `K` alternates.
//! Alternate `i` pairs the i-th ranked origin candidate with the i-th ranked
//! destination candidate; a side whose candidates are exhausted reuses the
//! lane's own base city for that index. No index is ever skipped.

use std::collections::HashSet;
use std::time::Duration;
use tracing::{debug, warn};

use crate::candidates::{Candidate, CandidateFinder};
use crate::directory::{self, CityDirectory};
use crate::types::{CandidatePair, City, Lane, PairKind, PairSequence};

pub struct PairSelector<'a, D: CityDirectory + ?Sized> {
    directory: &'a D,
    timeout: Duration,
}

impl<'a, D: CityDirectory + ?Sized> PairSelector<'a, D> {
    pub fn new(directory: &'a D, timeout: Duration) -> Self {
        Self { directory, timeout }
    }

    /// Look up a lane end in the directory. The top-ranked entry supplies
    /// coordinates and market; name and state stay as the lane gave them, so
    /// the base pair and its fallbacks export the lane's own cities. A miss or
    /// a failed lookup yields [`City::unresolved`].
    pub async fn resolve_base(&self, name: &str, state: &str) -> City {
        let query = self.directory.find_by_normalized_name(name, state);
        match directory::with_timeout(self.timeout, query).await {
            Ok(found) => match found.into_iter().next() {
                Some(entry) => City {
                    name: name.trim().to_string(),
                    state_code: state.trim().to_uppercase(),
                    ..entry
                },
                None => {
                    warn!(city = name, state, "city not in directory, alternates will repeat it");
                    City::unresolved(name, state)
                }
            },
            Err(e) => {
                warn!(city = name, state, error = %e, "base city lookup failed");
                City::unresolved(name, state)
            }
        }
    }

    /// Base pair plus exactly `k` alternates for `lane`.
    pub async fn select_pairs(&self, lane: &Lane, radius_miles: f64, k: usize) -> PairSequence {
        let (origin, dest) = tokio::join!(
            self.resolve_base(lane.origin_city(), lane.origin_state()),
            self.resolve_base(lane.dest_city(), lane.dest_state()),
        );
        self.select_from_bases(origin, dest, radius_miles, k).await
    }

    /// Same as [`select_pairs`](Self::select_pairs) for already-resolved base cities.
    pub async fn select_from_bases(&self, origin: City, dest: City, radius_miles: f64, k: usize) -> PairSequence {
        let base = CandidatePair {
            origin: origin.clone(),
            dest: dest.clone(),
            origin_miles: 0.0,
            dest_miles: 0.0,
            kind: PairKind::Base,
        };
        if k == 0 {
            return PairSequence::new(base, Vec::new());
        }

        let finder = CandidateFinder::new(self.directory, self.timeout);
        let origin_exclude = market_set(&origin);
        let dest_exclude = market_set(&dest);
        let (origin_candidates, dest_candidates) = tokio::join!(
            finder.find_candidates(&origin, radius_miles, &origin_exclude),
            finder.find_candidates(&dest, radius_miles, &dest_exclude),
        );

        let alternates: Vec<CandidatePair> = (0..k)
            .map(|i| alternate_at(i, &origin, &dest, &origin_candidates, &dest_candidates))
            .collect();

        let sequence = PairSequence::new(base, alternates);
        debug!(
            origin = %origin,
            dest = %dest,
            k,
            origin_candidates = origin_candidates.len(),
            dest_candidates = dest_candidates.len(),
            fallbacks = sequence.fallback_count(),
            "pairs selected"
        );
        sequence
    }
}

fn market_set(city: &City) -> HashSet<String> {
    let mut set = HashSet::new();
    if city.has_market() {
        set.insert(city.market_id.clone());
    }
    set
}

/// Exactly one pair for index `i`: each side takes its i-th candidate when
/// present and falls back to the base city otherwise.
fn alternate_at(
    i: usize,
    base_origin: &City,
    base_dest: &City,
    origin_candidates: &[Candidate],
    dest_candidates: &[Candidate],
) -> CandidatePair {
    let (origin, origin_miles) = match origin_candidates.get(i) {
        Some(c) => (c.city.clone(), c.miles),
        None => (base_origin.clone(), 0.0),
    };
    let (dest, dest_miles) = match dest_candidates.get(i) {
        Some(c) => (c.city.clone(), c.miles),
        None => (base_dest.clone(), 0.0),
    };

    let kind = match (origin_candidates.get(i).is_some(), dest_candidates.get(i).is_some()) {
        (true, true) => PairKind::Diverse,
        (false, true) => PairKind::OriginFallback,
        (true, false) => PairKind::DestFallback,
        (false, false) => PairKind::FullFallback,
    };

    CandidatePair { origin, dest, origin_miles, dest_miles, kind }
}
