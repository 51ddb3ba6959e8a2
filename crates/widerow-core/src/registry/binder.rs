//! Schema binding.
//!
//! Turns a declared [`RecordSchema`] into a [`RecordBinding`]:
//!
//! 1. Resolve the column family (defaults to the type name) and keyspace
//!    (defaults to the first registered one).
//! 2. Require exactly one row key.
//! 3. Inject `created_at` / `last_modified` for auto-timestamped types.
//! 4. Record each attribute's owner and name.
//! 5. Generate an index type per index descriptor, named
//!    `Auto_<Family>_<attr>`, and a save hook for the auto-saved ones.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tracing::debug;

use super::binding::{BindingKind, KeySelector, RecordBinding, SaveHook};
use super::{Keyspace, Registry};
use crate::codec::{AsciiCodec, BytesCodec, Codec, ForeignKeyCodec, MissingCodec, TimeCodec, TimeUuidCodec, Utf8Codec};
use crate::error::{MappingError, MappingResult};
use crate::schema::{
    Attribute, IndexDescriptor, IndexKind, IndexSchema, RecordSchema, RowKeyDescriptor, CREATED_AT, LAST_MODIFIED,
};
use crate::transport::ConsistencyLevel;
use crate::types::{ColumnKey, Comparator, Value};

/// Name of the column-key codec's attribute on generated index types.
const INDEX_TARGET_FIELD: &str = "target";

fn resolve_keyspace(registry: &Registry, requested: Option<&str>, record_type: &str) -> MappingResult<Arc<Keyspace>> {
    match requested {
        Some(name) => registry.keyspace(name).ok_or_else(|| {
            MappingError::Configuration(format!(
                "record type '{}' names keyspace '{}', which is not registered",
                record_type, name
            ))
        }),
        None => registry.keyspaces().into_iter().next().ok_or_else(|| {
            MappingError::Configuration(format!(
                "no keyspace registered for record type '{}'",
                record_type
            ))
        }),
    }
}

/// Column-key codec matching an index comparator.
fn index_key_codec(comparator: Comparator, index: &str) -> MappingResult<Arc<dyn Codec>> {
    match comparator {
        Comparator::TimeUuid | Comparator::LexicalUuid => Ok(Arc::new(TimeUuidCodec)),
        Comparator::Utf8 => Ok(Arc::new(Utf8Codec)),
        Comparator::Ascii => Ok(Arc::new(AsciiCodec)),
        Comparator::Bytes => Ok(Arc::new(BytesCodec)),
        Comparator::Long => Err(MappingError::schema(format!(
            "index '{}' cannot be ordered by {}",
            index, comparator
        ))),
    }
}

struct IndexParams {
    name: String,
    column_family: String,
    target: String,
    manual: bool,
    row_key: RowKeyDescriptor,
    comparator: Comparator,
    unique: bool,
    comment: Option<String>,
    read_consistency: ConsistencyLevel,
    write_consistency: ConsistencyLevel,
}

fn build_index(registry: &Registry, keyspace: Arc<Keyspace>, params: IndexParams) -> MappingResult<Arc<RecordBinding>> {
    let key_codec = index_key_codec(params.comparator, &params.name)?;
    let mut target_codec = ForeignKeyCodec::new(params.target.clone());
    if params.unique {
        target_codec = target_codec.unique();
    }
    let fallback = Attribute::with_codecs(key_codec, Arc::new(target_codec));
    fallback.set_owner_and_name(&params.name, INDEX_TARGET_FIELD)?;

    debug!(
        index = %params.name,
        target = %params.target,
        comparator = %params.comparator,
        unique = params.unique,
        "bound index type"
    );

    Ok(Arc::new(RecordBinding {
        name: params.name,
        column_family: params.column_family,
        column_type: crate::types::STANDARD_COLUMN_TYPE.to_string(),
        comparator: params.comparator,
        comment: params.comment,
        keyspace,
        registry: Arc::downgrade(registry.state()),
        row_key: params.row_key,
        attributes: Vec::new(),
        column_index: HashMap::new(),
        fallback: Arc::new(fallback),
        kind: BindingKind::Index {
            target: params.target,
            manual: params.manual,
        },
        indexes: Vec::new(),
        save_hooks: Vec::new(),
        read_consistency: params.read_consistency,
        write_consistency: params.write_consistency,
        config: registry.config().clone(),
    }))
}

/// Bind a standalone index type.
pub(super) fn bind_index(registry: &Registry, schema: IndexSchema) -> MappingResult<Arc<RecordBinding>> {
    if schema.name.is_empty() {
        return Err(MappingError::schema("index type name must not be empty"));
    }
    let keyspace = resolve_keyspace(registry, schema.keyspace.as_deref(), &schema.name)?;
    let mut row_key = RowKeyDescriptor::new(schema.row_key_name);
    if let Some(key) = schema.default_key {
        row_key = row_key.with_default(key);
    }
    let config = registry.config();
    build_index(
        registry,
        keyspace,
        IndexParams {
            column_family: schema.column_family.unwrap_or_else(|| schema.name.clone()),
            name: schema.name,
            target: schema.target,
            manual: true,
            row_key,
            comparator: schema.comparator,
            unique: schema.unique,
            comment: schema.comment,
            read_consistency: schema.read_consistency.unwrap_or(config.read_consistency),
            write_consistency: schema.write_consistency.unwrap_or(config.write_consistency),
        },
    )
}

/// Bind a record type and generate its index types.
pub(super) fn bind_record(registry: &Registry, schema: RecordSchema) -> MappingResult<Arc<RecordBinding>> {
    let RecordSchema {
        name,
        keyspace,
        column_family,
        column_type,
        comparator,
        comment,
        mut row_keys,
        mut attributes,
        indexes,
        auto_timestamp,
        read_consistency,
        write_consistency,
    } = schema;

    if name.is_empty() {
        return Err(MappingError::schema("record type name must not be empty"));
    }
    let column_family = column_family.unwrap_or_else(|| name.clone());
    let keyspace = resolve_keyspace(registry, keyspace.as_deref(), &name)?;
    let config = registry.config();
    let read_consistency = read_consistency.unwrap_or(config.read_consistency);
    let write_consistency = write_consistency.unwrap_or(config.write_consistency);

    // Row key
    if row_keys.len() != 1 {
        return Err(MappingError::schema(format!(
            "'{}' declares {} row keys, expected exactly one",
            name,
            row_keys.len()
        )));
    }
    let row_key = row_keys.remove(0);

    // Attributes
    if auto_timestamp {
        for reserved in [CREATED_AT, LAST_MODIFIED] {
            if attributes.iter().any(|(n, _)| n == reserved) {
                return Err(MappingError::schema(format!(
                    "'{}' declares '{}', which is reserved for auto timestamps",
                    name, reserved
                )));
            }
        }
        attributes.push((CREATED_AT.to_string(), Arc::new(Attribute::new(TimeCodec::created()))));
        attributes.push((LAST_MODIFIED.to_string(), Arc::new(Attribute::new(TimeCodec::modified()))));
    }

    let mut column_index: HashMap<ColumnKey, usize> = HashMap::with_capacity(attributes.len());
    for (i, (attr_name, attribute)) in attributes.iter().enumerate() {
        if attr_name.is_empty() {
            return Err(MappingError::schema(format!("'{}' declares an attribute with no name", name)));
        }
        if attr_name == row_key.name() {
            return Err(MappingError::schema(format!(
                "'{}' declares attribute '{}', which is the row key name",
                name, attr_name
            )));
        }
        attribute.set_owner_and_name(&name, attr_name)?;
        let column_key = attribute
            .key_codec()
            .to_internal(&Value::from(attr_name.as_str()))
            .map_err(|e| e.for_attribute(&name, attr_name))?;
        comparator
            .validate(&column_key)
            .map_err(|msg| MappingError::schema(format!("{}.{}: {}", name, attr_name, msg)))?;
        if column_index.insert(column_key, i).is_some() {
            return Err(MappingError::schema(format!("'{}' declares '{}' twice", name, attr_name)));
        }
    }

    // Indexes
    let mut seen: HashSet<&str> = HashSet::new();
    let mut generated: Vec<(String, Arc<RecordBinding>)> = Vec::with_capacity(indexes.len());
    let mut save_hooks: Vec<SaveHook> = Vec::new();
    for (index_name, descriptor) in &indexes {
        if !seen.insert(index_name.as_str()) || attributes.iter().any(|(n, _)| n == index_name) {
            return Err(MappingError::schema(format!(
                "'{}' declares index '{}', which clashes with another name",
                name, index_name
            )));
        }
        let (index, selector) = bind_descriptor(
            registry,
            &keyspace,
            &name,
            &column_family,
            &attributes,
            index_name,
            descriptor,
            (read_consistency, write_consistency),
        )?;
        if let Some(selector) = selector {
            save_hooks.push(SaveHook {
                index_name: index_name.clone(),
                index: Arc::clone(&index),
                selector,
            });
        }
        generated.push((index_name.clone(), index));
    }

    Ok(Arc::new(RecordBinding {
        name,
        column_family,
        column_type,
        comparator,
        comment,
        keyspace,
        registry: Arc::downgrade(registry.state()),
        row_key,
        attributes,
        column_index,
        fallback: Arc::new(Attribute::new(MissingCodec)),
        kind: BindingKind::Model,
        indexes: generated,
        save_hooks,
        read_consistency,
        write_consistency,
        config: config.clone(),
    }))
}

#[allow(clippy::too_many_arguments)]
fn bind_descriptor(
    registry: &Registry,
    keyspace: &Arc<Keyspace>,
    owner: &str,
    owner_family: &str,
    attributes: &[(String, Arc<Attribute>)],
    index_name: &str,
    descriptor: &IndexDescriptor,
    (read_consistency, write_consistency): (ConsistencyLevel, ConsistencyLevel),
) -> MappingResult<(Arc<RecordBinding>, Option<KeySelector>)> {
    let (target, manual) = match descriptor.kind() {
        IndexKind::All => (owner.to_string(), false),
        IndexKind::Secondary { field } => {
            let attribute = attributes
                .iter()
                .find(|(n, _)| n == field)
                .map(|(_, a)| a)
                .ok_or_else(|| {
                    MappingError::schema(format!(
                        "index '{}' of '{}' refers to unknown field '{}'",
                        index_name, owner, field
                    ))
                })?;
            // Field values become index row keys.
            if !attribute.codec().text_wire() {
                return Err(MappingError::schema(format!(
                    "index '{}' of '{}' cannot key rows by field '{}': {} values are not text",
                    index_name,
                    owner,
                    field,
                    attribute.codec().name()
                )));
            }
            (owner.to_string(), false)
        }
        IndexKind::Manual { target } => (target.clone(), true),
    };

    let row_key_name = descriptor
        .row_key()
        .map(str::to_string)
        .unwrap_or_else(|| owner_family.to_lowercase());
    let mut row_key = RowKeyDescriptor::new(row_key_name);
    if let Some(key) = descriptor.default_row_key() {
        row_key = row_key.with_default(key);
    }

    let generated_name = format!("Auto_{}_{}", owner_family, index_name);
    let index = build_index(
        registry,
        Arc::clone(keyspace),
        IndexParams {
            name: generated_name.clone(),
            column_family: generated_name,
            target,
            manual,
            row_key,
            comparator: descriptor.comparator(),
            unique: descriptor.is_unique(),
            comment: Some(format!("Index '{}' of {}", index_name, owner)),
            read_consistency,
            write_consistency,
        },
    )?;

    if !descriptor.is_auto_save() {
        return Ok((index, None));
    }
    let selector = match (descriptor.default_row_key(), descriptor.kind()) {
        (Some(key), _) => KeySelector::Fixed(key.to_string()),
        (None, IndexKind::Secondary { field }) => {
            let attribute = attributes
                .iter()
                .find(|(n, _)| n == field)
                .map(|(_, a)| a)
                .ok_or_else(|| MappingError::schema(format!("unknown field '{}'", field)))?;
            let column_key = attribute
                .key_codec()
                .to_internal(&Value::from(field.as_str()))
                .map_err(|e| e.for_attribute(owner, field))?;
            KeySelector::Field {
                name: field.clone(),
                column_key,
                mandatory: attribute.is_mandatory(),
            }
        }
        (None, _) => {
            return Err(MappingError::schema(format!(
                "auto-saved index '{}' of '{}' needs a default key or an indexed field",
                index_name, owner
            )))
        }
    };
    Ok((index, Some(selector)))
}
