//! Schema verification against a live store.

use tracing::{info, warn};

use super::Registry;
use crate::error::MappingResult;
use crate::transport::ColumnFamilyDef;

/// What [`Registry::sync_schema`] may change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaSync {
    /// Report differences only.
    VerifyOnly,
    /// Create column families that do not exist yet.
    CreateMissing,
}

/// A column family whose live definition differs from the declared one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaMismatch {
    pub expected: ColumnFamilyDef,
    pub found: ColumnFamilyDef,
}

/// Outcome of a schema sync, by column family name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchemaReport {
    /// Families that exist with the declared definition.
    pub verified: Vec<String>,
    /// Families created by this sync.
    pub created: Vec<String>,
    /// Families that do not exist and were not created.
    pub missing: Vec<String>,
    /// Families that exist with a different comparator or column type.
    pub mismatched: Vec<SchemaMismatch>,
}

impl SchemaReport {
    /// Whether every declared family now exists as declared.
    pub fn is_consistent(&self) -> bool {
        self.missing.is_empty() && self.mismatched.is_empty()
    }
}

impl Registry {
    /// Compare every registered type's `{keyspace, column_family,
    /// column_type, comparator}` against the store.
    ///
    /// Mismatches are reported, never repaired.
    ///
    /// # Errors
    ///
    /// Transport errors from `describe_column_family` or
    /// `create_column_family`.
    pub fn sync_schema(&self, mode: SchemaSync) -> MappingResult<SchemaReport> {
        let mut report = SchemaReport::default();
        for binding in self.record_types() {
            let expected = binding.column_family_def();
            let live = binding
                .transport()
                .describe_column_family(&expected.keyspace, &expected.name)?;
            match live {
                Some(found) if found.comparator == expected.comparator && found.column_type == expected.column_type => {
                    report.verified.push(expected.name);
                }
                Some(found) => {
                    warn!(
                        column_family = %expected.name,
                        expected = %expected.comparator,
                        found = %found.comparator,
                        "column family definition differs"
                    );
                    report.mismatched.push(SchemaMismatch { expected, found });
                }
                None if mode == SchemaSync::CreateMissing => {
                    binding.transport().create_column_family(&expected)?;
                    info!(keyspace = %expected.keyspace, column_family = %expected.name, "created column family");
                    report.created.push(expected.name);
                }
                None => {
                    warn!(keyspace = %expected.keyspace, column_family = %expected.name, "column family missing");
                    report.missing.push(expected.name);
                }
            }
        }
        Ok(report)
    }
}
