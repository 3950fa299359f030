//! Posting expansion: every pair becomes one row per contact method.
//!
//! Row count for a lane is `(K + 1) * C`. Column layout belongs to the
//! downstream serializer; this module only fixes the count and the order
//! (pair order, then contact-method order).

use serde::Serialize;

use crate::types::{CandidatePair, Lane, PairKind, PairSequence};

/// Number of export rows a sequence expands into.
pub fn row_count(sequence: &PairSequence, contacts_per_posting: usize) -> usize {
    sequence.len() * contacts_per_posting
}

/// `(pair, contact_method_index)` for every output row, pair-major.
pub fn expand(sequence: &PairSequence, contacts_per_posting: usize) -> Vec<(&CandidatePair, usize)> {
    sequence
        .iter()
        .flat_map(|pair| (0..contacts_per_posting).map(move |method| (pair, method)))
        .collect()
}

/// One load-board export row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExportRow {
    pub lane_index: usize,
    pub pair_index: usize,
    pub origin_city: String,
    pub origin_state: String,
    pub dest_city: String,
    pub dest_state: String,
    pub equipment_code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weight: Option<f64>,
    pub contact_method: String,
    pub kind: PairKind,
}

/// Export rows for one lane, labelled with `contact_methods`.
pub fn export_rows(
    lane_index: usize,
    lane: &Lane,
    sequence: &PairSequence,
    contact_methods: &[String],
) -> Vec<ExportRow> {
    sequence
        .iter()
        .enumerate()
        .flat_map(move |(pair_index, pair)| {
            contact_methods.iter().map(move |method| ExportRow {
                lane_index,
                pair_index,
                origin_city: pair.origin.name.clone(),
                origin_state: pair.origin.state_code.clone(),
                dest_city: pair.dest.name.clone(),
                dest_state: pair.dest.state_code.clone(),
                equipment_code: lane.equipment_code().to_string(),
                weight: lane.weight(),
                contact_method: method.clone(),
                kind: pair.kind,
            })
        })
        .collect()
}
