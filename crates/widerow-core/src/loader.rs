//! Batch loading.
//!
//! [`load_multi`] fetches many rows of one type in a single round trip.
//! Duplicate keys are fetched once. Rows the store returns with no columns
//! are dropped. In ordered mode (the default) the result follows the
//! request order, repeating a record for each repeated key; unordered mode
//! keeps whatever order the transport returned.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tracing::debug;

use crate::error::{MappingError, MappingResult};
use crate::record::Record;
use crate::registry::RecordBinding;
use crate::transport::{ConsistencyLevel, SlicePredicate};
use crate::types::RowKey;

/// Options for [`load_multi`], [`Record::load_with`] and index resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadOptions {
    /// Re-emit results in request order.
    pub ordered: bool,
    /// Columns to fetch. Defaults to the whole row up to
    /// `MappingConfig::default_column_count`.
    pub predicate: Option<SlicePredicate>,
    /// Read consistency. Defaults to the type's read level.
    pub consistency: Option<ConsistencyLevel>,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            ordered: true,
            predicate: None,
            consistency: None,
        }
    }
}

impl LoadOptions {
    /// Keep the transport's order.
    pub fn unordered() -> Self {
        Self {
            ordered: false,
            ..Self::default()
        }
    }

    pub fn with_predicate(mut self, predicate: SlicePredicate) -> Self {
        self.predicate = Some(predicate);
        self
    }

    pub fn with_consistency(mut self, consistency: ConsistencyLevel) -> Self {
        self.consistency = Some(consistency);
        self
    }
}

/// Load the rows stored under `keys`.
///
/// # Errors
///
/// - `MappingError::InvalidArgument` if `keys` is empty or holds an empty key
/// - `MappingError::Transport` if the fetch fails
pub fn load_multi(binding: &Arc<RecordBinding>, keys: &[RowKey], options: &LoadOptions) -> MappingResult<Vec<Record>> {
    if keys.is_empty() {
        return Err(MappingError::InvalidArgument(format!(
            "batch load of '{}' needs at least one key",
            binding.name()
        )));
    }
    if keys.iter().any(String::is_empty) {
        return Err(MappingError::InvalidArgument(format!(
            "batch load of '{}' got an empty row key",
            binding.name()
        )));
    }

    let mut seen: HashSet<&str> = HashSet::with_capacity(keys.len());
    let unique: Vec<RowKey> = keys.iter().filter(|k| seen.insert(k.as_str())).cloned().collect();

    let predicate = options
        .predicate
        .clone()
        .unwrap_or_else(|| SlicePredicate::all(binding.config().default_column_count));
    let consistency = options.consistency.unwrap_or_else(|| binding.read_consistency());

    let slices = binding.transport().multiget_columns(
        binding.keyspace().name(),
        binding.column_family(),
        &unique,
        &predicate,
        consistency,
    )?;

    let mut records: Vec<Record> = Vec::with_capacity(slices.len());
    for slice in slices {
        if slice.columns.is_empty() || !seen.contains(slice.row_key.as_str()) {
            continue;
        }
        records.push(Record::from_slice(Arc::clone(binding), slice.row_key, slice.columns)?);
    }
    debug!(
        record_type = %binding.name(),
        requested = keys.len(),
        fetched = unique.len(),
        found = records.len(),
        "batch loaded records"
    );

    if !options.ordered {
        return Ok(records);
    }
    let by_key: HashMap<RowKey, Record> = records
        .into_iter()
        .filter_map(|r| r.row_key().map(str::to_string).map(|k| (k, r)))
        .collect();
    Ok(keys.iter().filter_map(|k| by_key.get(k).cloned()).collect())
}
