//! Lane processing: validation, pair selection, and row expansion, one lane
//! at a time or as a concurrent batch.

use serde::Serialize;
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::config::EngineConfig;
use crate::directory::CityDirectory;
use crate::posting::{export_rows, row_count, ExportRow};
use crate::selector::PairSelector;
use crate::types::{City, Lane, LaneError, LaneInput, PairSequence};

/// A processed lane.
#[derive(Debug, Clone, Serialize)]
pub struct LaneOutcome {
    pub lane: Lane,
    pub sequence: PairSequence,
    pub rows: Vec<ExportRow>,
}

/// Batch totals.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    pub lanes_ok: usize,
    /// Lanes rejected as invalid input.
    pub lanes_failed: usize,
    /// Lanes whose task panicked or was cancelled.
    pub lanes_aborted: usize,
    pub total_rows: usize,
    pub fallback_pairs: usize,
}

#[derive(Debug, Serialize)]
pub struct BatchResult {
    /// One entry per input lane, in input order.
    #[serde(serialize_with = "serialize_outcomes")]
    pub outcomes: Vec<Result<LaneOutcome, LaneError>>,
    pub report: BatchReport,
}

impl BatchResult {
    pub fn rows(&self) -> impl Iterator<Item = &ExportRow> {
        self.outcomes.iter().filter_map(|o| o.as_ref().ok()).flat_map(|o| o.rows.iter())
    }

    /// `(lane_index, error)` for every rejected lane.
    pub fn errors(&self) -> impl Iterator<Item = (usize, &LaneError)> {
        self.outcomes
            .iter()
            .enumerate()
            .filter_map(|(i, o)| o.as_ref().err().map(|e| (i, e)))
    }

    /// Resolved base cities of every successful lane, deduplicated.
    pub fn base_cities(&self) -> Vec<City> {
        let mut cities: Vec<City> = Vec::new();
        for outcome in self.outcomes.iter().filter_map(|o| o.as_ref().ok()) {
            let base = outcome.sequence.base();
            for city in [&base.origin, &base.dest] {
                if city.is_resolved() && !cities.iter().any(|c| c == city) {
                    cities.push(city.clone());
                }
            }
        }
        cities
    }
}

fn serialize_outcomes<S>(outcomes: &[Result<LaneOutcome, LaneError>], s: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    #[derive(Serialize)]
    #[serde(untagged)]
    enum Entry<'a> {
        Ok(&'a LaneOutcome),
        Err { error: String },
    }
    let entries: Vec<Entry<'_>> = outcomes
        .iter()
        .map(|o| match o {
            Ok(outcome) => Entry::Ok(outcome),
            Err(e) => Entry::Err { error: e.to_string() },
        })
        .collect();
    entries.serialize(s)
}

/// Owns the directory handle and configuration. Cheap to clone.
pub struct LaneEngine<D: CityDirectory + ?Sized> {
    directory: Arc<D>,
    config: Arc<EngineConfig>,
}

impl<D: CityDirectory + ?Sized> Clone for LaneEngine<D> {
    fn clone(&self) -> Self {
        Self {
            directory: Arc::clone(&self.directory),
            config: Arc::clone(&self.config),
        }
    }
}

impl<D: CityDirectory + ?Sized> LaneEngine<D> {
    pub fn new(directory: Arc<D>, config: EngineConfig) -> Self {
        Self {
            directory,
            config: Arc::new(config),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn directory(&self) -> &D {
        &self.directory
    }

    /// Base pair plus exactly `k` alternates.
    pub async fn select_pairs(&self, lane: &Lane, radius_miles: f64, k: usize) -> PairSequence {
        PairSelector::new(&*self.directory, self.config.directory_timeout())
            .select_pairs(lane, radius_miles, k)
            .await
    }

    /// Validate, select, and expand one lane.
    pub async fn process_lane(&self, lane_index: usize, input: LaneInput) -> Result<LaneOutcome, LaneError> {
        let lane = Lane::try_from(input).inspect_err(|e| {
            warn!(lane_index, error = %e, "lane rejected");
        })?;

        let k = self.config.alternates_for(lane.target());
        if k > self.config.max_alternates {
            warn!(lane_index, k, max = self.config.max_alternates, "lane asks for too many alternates");
            return Err(LaneError::InvalidLaneInput { field: "target_alternates" });
        }
        let sequence = self.select_pairs(&lane, self.config.effective_radius(), k).await;
        let rows = export_rows(lane_index, &lane, &sequence, &self.config.contact_methods);
        debug_assert_eq!(rows.len(), row_count(&sequence, self.config.contacts_per_posting()));

        debug!(lane_index, lane = %lane, k, rows = rows.len(), "lane processed");
        Ok(LaneOutcome { lane, sequence, rows })
    }
}

impl<D: CityDirectory + ?Sized + 'static> LaneEngine<D> {
    /// Process every lane concurrently. Results come back in input order.
    pub async fn process_batch(&self, inputs: Vec<LaneInput>) -> BatchResult {
        let total = inputs.len();
        let mut tasks = JoinSet::new();
        for (i, input) in inputs.into_iter().enumerate() {
            let engine = self.clone();
            tasks.spawn(async move { (i, engine.process_lane(i, input).await) });
        }

        let mut slots: Vec<Option<Result<LaneOutcome, LaneError>>> = (0..total).map(|_| None).collect();
        let mut aborted = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((i, outcome)) => slots[i] = Some(outcome),
                Err(e) => {
                    warn!(error = %e, "lane task aborted");
                    aborted.push(e.to_string());
                }
            }
        }

        // Slots a failed task never filled; the join error does not carry
        // the lane index, so the reasons are attached in slot order.
        let mut reasons = aborted.into_iter();
        let mut report = BatchReport::default();
        let outcomes: Vec<Result<LaneOutcome, LaneError>> = slots
            .into_iter()
            .map(|slot| {
                slot.unwrap_or_else(|| {
                    Err(LaneError::Aborted(reasons.next().unwrap_or_else(|| "task lost".into())))
                })
            })
            .collect();

        for outcome in &outcomes {
            match outcome {
                Ok(o) => {
                    report.lanes_ok += 1;
                    report.total_rows += o.rows.len();
                    report.fallback_pairs += o.sequence.fallback_count();
                }
                Err(LaneError::Aborted(_)) => report.lanes_aborted += 1,
                Err(LaneError::InvalidLaneInput { .. }) => report.lanes_failed += 1,
            }
        }

        info!(
            lanes = total,
            ok = report.lanes_ok,
            failed = report.lanes_failed,
            aborted = report.lanes_aborted,
            rows = report.total_rows,
            fallbacks = report.fallback_pairs,
            "batch processed"
        );
        BatchResult { outcomes, report }
    }
}
