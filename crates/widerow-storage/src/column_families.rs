//! RocksDB column family layout.
//!
//! # Column Families
//! | Name | Purpose | Key Format | Value |
//! |------|---------|------------|-------|
//! | `__schema` | Store family definitions | `"keyspace.family"` | `StoredFamilyDef` (bincode) |
//! | `keyspace.family` | One per store family | see [`crate::keys`] | `StoredCell` (bincode) |
//!
//! Store families are created and dropped at runtime through the
//! `Transport` schema calls; `__schema` is created at open time.

use rocksdb::{BlockBasedOptions, Cache, ColumnFamilyDescriptor, Options, DEFAULT_COLUMN_FAMILY_NAME};
use serde::{Deserialize, Serialize};
use widerow_core::transport::ColumnFamilyDef;

use crate::error::{RocksResult, RocksTransportError};

// =============================================================================
// COLUMN FAMILY NAMES
// =============================================================================

/// Definitions of every store family, keyed by [`data_cf_name`].
pub const CF_SCHEMA: &str = "__schema";

/// Families the transport always opens.
pub const FIXED_CFS: &[&str] = &[CF_SCHEMA];

/// RocksDB column family backing one store column family.
pub fn data_cf_name(keyspace: &str, family: &str) -> String {
    format!("{}.{}", keyspace, family)
}

/// Whether a RocksDB family name belongs to a store column family.
pub fn is_data_cf(name: &str) -> bool {
    name != DEFAULT_COLUMN_FAMILY_NAME && !FIXED_CFS.contains(&name)
}

// =============================================================================
// CF OPTION BUILDERS
// =============================================================================

/// Options for the schema family (tiny, point lookups and full scans).
pub fn schema_cf_options(cache: &Cache) -> Options {
    let mut block_opts = BlockBasedOptions::default();
    block_opts.set_block_cache(cache);
    block_opts.set_bloom_filter(10.0, false);
    block_opts.set_cache_index_and_filter_blocks(true);

    let mut opts = Options::default();
    opts.set_block_based_table_factory(&block_opts);
    opts.set_compression_type(rocksdb::DBCompressionType::None);
    opts.optimize_for_point_lookup(16);
    opts.create_if_missing(true);
    opts
}

/// Options for store families.
///
/// Rows are read as contiguous slices, so no point-lookup tuning. LZ4
/// compression since column values repeat heavily across rows.
pub fn data_cf_options(cache: &Cache) -> Options {
    let mut block_opts = BlockBasedOptions::default();
    block_opts.set_block_cache(cache);
    block_opts.set_bloom_filter(10.0, false);
    block_opts.set_cache_index_and_filter_blocks(true);

    let mut opts = Options::default();
    opts.set_block_based_table_factory(&block_opts);
    opts.set_compression_type(rocksdb::DBCompressionType::Lz4);
    opts.create_if_missing(true);
    opts
}

/// Descriptors for every family to open: the fixed ones plus each
/// existing store family found on disk.
pub fn get_cf_descriptors(existing: &[String], cache: &Cache) -> Vec<ColumnFamilyDescriptor> {
    let mut descriptors = vec![ColumnFamilyDescriptor::new(CF_SCHEMA, schema_cf_options(cache))];
    descriptors.extend(
        existing
            .iter()
            .filter(|name| is_data_cf(name))
            .map(|name| ColumnFamilyDescriptor::new(name.as_str(), data_cf_options(cache))),
    );
    descriptors
}

// =============================================================================
// SCHEMA RECORDS
// =============================================================================

/// Version of the [`StoredFamilyDef`] layout.
pub const SCHEMA_FORMAT_VERSION: u8 = 1;

/// A [`ColumnFamilyDef`] as persisted in [`CF_SCHEMA`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredFamilyDef {
    pub version: u8,
    pub def: ColumnFamilyDef,
}

pub fn encode_family_def(def: &ColumnFamilyDef) -> RocksResult<Vec<u8>> {
    Ok(bincode::serialize(&StoredFamilyDef {
        version: SCHEMA_FORMAT_VERSION,
        def: def.clone(),
    })?)
}

pub fn decode_family_def(bytes: &[u8]) -> RocksResult<ColumnFamilyDef> {
    let stored: StoredFamilyDef = bincode::deserialize(bytes)?;
    if stored.version != SCHEMA_FORMAT_VERSION {
        return Err(RocksTransportError::UnsupportedFormat {
            found: stored.version,
            expected: SCHEMA_FORMAT_VERSION,
        });
    }
    Ok(stored.def)
}
