//! Loading rows into records.

use std::sync::Arc;

use tracing::{trace, warn};

use super::Record;
use crate::error::{MappingError, MappingResult};
use crate::loader::LoadOptions;
use crate::registry::RecordBinding;
use crate::transport::{Column, SlicePredicate};
use crate::types::{ColumnKey, RowKey};

impl Record {
    /// Replace this record's contents with the stored row.
    ///
    /// Uses the record's row key, or the type's default key when none is
    /// set. A row with no columns leaves the record empty and not
    /// persisted.
    ///
    /// # Errors
    ///
    /// - `MappingError::MissingRowKey` if neither a row key nor a default
    ///   is available
    /// - `MappingError::Transport` if the fetch fails
    pub fn load(&mut self) -> MappingResult<()> {
        self.load_with(&LoadOptions::default())
    }

    /// Load with an explicit column predicate or consistency.
    pub fn load_with(&mut self, options: &LoadOptions) -> MappingResult<()> {
        let binding = Arc::clone(&self.binding);
        let row_key: RowKey = match &self.row_key {
            Some(key) => key.clone(),
            None => match binding.row_key().key_for_load() {
                Some(key) => key?,
                None => {
                    return Err(MappingError::MissingRowKey {
                        record_type: binding.name().to_string(),
                    })
                }
            },
        };

        let predicate = options
            .predicate
            .clone()
            .unwrap_or_else(|| SlicePredicate::all(binding.config().default_column_count));
        let consistency = options.consistency.unwrap_or_else(|| binding.read_consistency());

        let slices = binding.transport().multiget_columns(
            binding.keyspace().name(),
            binding.column_family(),
            std::slice::from_ref(&row_key),
            &predicate,
            consistency,
        )?;
        let columns = slices
            .into_iter()
            .find(|slice| slice.row_key == row_key)
            .map(|slice| slice.columns)
            .unwrap_or_default();

        self.row_key = Some(row_key);
        self.apply_loaded(columns)
    }

    /// Build a record from an already-fetched row.
    pub(crate) fn from_slice(
        binding: Arc<RecordBinding>,
        row_key: RowKey,
        columns: Vec<Column>,
    ) -> MappingResult<Record> {
        let mut record = Record::with_key(binding, row_key);
        record.apply_loaded(columns)?;
        Ok(record)
    }

    /// Reset to the fetched columns. Nothing is marked changed.
    fn apply_loaded(&mut self, columns: Vec<Column>) -> MappingResult<()> {
        self.ordered_column_keys.clear();
        self.column_values.clear();
        self.column_changed.clear();
        self.persisted = !columns.is_empty();

        let binding = Arc::clone(&self.binding);
        for column in columns {
            let (name, attribute) = binding.attribute_for_column(&column.name);
            let decoded = attribute
                .key_codec()
                .to_identity(&column.name)
                .and_then(|key| attribute.codec().to_identity(&column.value).map(|value| (key, value)));
            match decoded {
                Ok((key, value)) => self.insert_value(key, value),
                Err(e) => {
                    warn!(
                        record_type = %binding.name(),
                        row_key = self.row_key.as_deref().unwrap_or_default(),
                        attribute = name,
                        error = %e,
                        "skipping impossible column"
                    );
                }
            }
        }

        for (name, attribute) in binding.attributes() {
            let column_key: ColumnKey = binding.column_key_of(name)?;
            if self.column_values.contains_key(&column_key) {
                continue;
            }
            if let Some(default) = attribute.explicit_default_internal() {
                let value = default.map_err(|e| e.for_attribute(binding.name(), name))?;
                self.insert_value(column_key, value);
            }
        }

        trace!(
            record_type = %binding.name(),
            row_key = self.row_key.as_deref().unwrap_or_default(),
            columns = self.ordered_column_keys.len(),
            persisted = self.persisted,
            "loaded record"
        );
        Ok(())
    }
}
