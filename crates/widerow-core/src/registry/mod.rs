//! Record type registry.
//!
//! The [`Registry`] owns clusters, keyspaces and every registered record
//! type. It is built once at startup and passed to whatever needs it; cloning
//! is cheap (the state is shared).
//!
//! Registration is the only write path: [`Registry::register_record_type`]
//! validates a [`RecordSchema`], binds its attributes, generates its index
//! types and returns an immutable [`RecordBinding`]. Registrations are
//! serialized by one lock; lookups take a read lock and never block each
//! other.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use widerow_core::schema::{Attribute, RecordSchema, RowKeyDescriptor};
//! use widerow_core::{MemoryTransport, Registry, SchemaSync};
//!
//! let registry = Registry::default();
//! registry.add_cluster("main").unwrap();
//! registry.add_keyspace("main", "app", Arc::new(MemoryTransport::new())).unwrap();
//!
//! let user = registry
//!     .register_record_type(
//!         RecordSchema::new("User")
//!             .row_key(RowKeyDescriptor::new("uuid").autogenerate())
//!             .attribute("username", Attribute::text()),
//!     )
//!     .unwrap();
//! assert_eq!(user.path(), "main/app/User");
//!
//! let report = registry.sync_schema(SchemaSync::CreateMissing).unwrap();
//! assert_eq!(report.created, vec!["User".to_string()]);
//! ```

mod binder;
mod binding;
mod sync;


pub use binding::{BindingKind, KeySelector, RecordBinding, SaveHook};
pub use sync::{SchemaMismatch, SchemaReport, SchemaSync};

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tracing::{debug, info};

use crate::config::MappingConfig;
use crate::error::{MappingError, MappingResult};
use crate::loader::{load_multi, LoadOptions};
use crate::record::Record;
use crate::schema::{IndexSchema, RecordSchema};
use crate::transport::Transport;
use crate::types::RecordRef;

/// Separator between the components of a registry path.
pub const PATH_SEPARATOR: &str = "/";

// ============================================================================
// CLUSTER / KEYSPACE
// ============================================================================

/// Named group of keyspaces.
#[derive(Debug)]
pub struct Cluster {
    name: String,
    keyspaces: RwLock<Vec<String>>,
}

impl Cluster {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Keyspace names in registration order.
    pub fn keyspaces(&self) -> Vec<String> {
        self.keyspaces.read().clone()
    }
}

/// Namespace of record types sharing one transport.
#[derive(Debug)]
pub struct Keyspace {
    name: String,
    cluster: String,
    transport: Arc<dyn Transport>,
    record_types: RwLock<Vec<String>>,
}

impl Keyspace {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn cluster(&self) -> &str {
        &self.cluster
    }

    pub fn transport(&self) -> &dyn Transport {
        self.transport.as_ref()
    }

    /// Shared handle to the transport.
    pub fn transport_handle(&self) -> Arc<dyn Transport> {
        Arc::clone(&self.transport)
    }

    /// Record type names in registration order.
    pub fn record_types(&self) -> Vec<String> {
        self.record_types.read().clone()
    }

    /// `cluster/keyspace`.
    pub fn path(&self) -> String {
        [self.cluster.as_str(), self.name.as_str()].join(PATH_SEPARATOR)
    }
}

// ============================================================================
// REGISTRY
// ============================================================================

pub(crate) struct RegistryState {
    config: MappingConfig,
    clusters: RwLock<Vec<Arc<Cluster>>>,
    keyspaces: RwLock<Vec<Arc<Keyspace>>>,
    record_types: RwLock<HashMap<String, Arc<RecordBinding>>>,
    bind_lock: Mutex<()>,
}

/// Shared registry of clusters, keyspaces and record types.
#[derive(Clone)]
pub struct Registry {
    inner: Arc<RegistryState>,
}

impl Registry {
    /// Create an empty registry.
    ///
    /// # Errors
    ///
    /// `MappingError::Configuration` if `config` does not validate.
    pub fn new(config: MappingConfig) -> MappingResult<Self> {
        config.validate()?;
        Ok(Self::with_config(config))
    }

    fn with_config(config: MappingConfig) -> Self {
        Self {
            inner: Arc::new(RegistryState {
                config,
                clusters: RwLock::new(Vec::new()),
                keyspaces: RwLock::new(Vec::new()),
                record_types: RwLock::new(HashMap::new()),
                bind_lock: Mutex::new(()),
            }),
        }
    }

    pub(crate) fn from_state(inner: Arc<RegistryState>) -> Self {
        Self { inner }
    }

    pub(crate) fn state(&self) -> &Arc<RegistryState> {
        &self.inner
    }

    pub fn config(&self) -> &MappingConfig {
        &self.inner.config
    }

    /// Register a cluster.
    ///
    /// # Errors
    ///
    /// `MappingError::Configuration` if the name is empty or taken.
    pub fn add_cluster(&self, name: &str) -> MappingResult<Arc<Cluster>> {
        if name.is_empty() {
            return Err(MappingError::Configuration("cluster name must not be empty".to_string()));
        }
        let mut clusters = self.inner.clusters.write();
        if clusters.iter().any(|c| c.name == name) {
            return Err(MappingError::Configuration(format!("cluster '{}' is already registered", name)));
        }
        let cluster = Arc::new(Cluster {
            name: name.to_string(),
            keyspaces: RwLock::new(Vec::new()),
        });
        clusters.push(Arc::clone(&cluster));
        debug!(cluster = name, "registered cluster");
        Ok(cluster)
    }

    pub fn cluster(&self, name: &str) -> Option<Arc<Cluster>> {
        self.inner.clusters.read().iter().find(|c| c.name == name).cloned()
    }

    /// Register a keyspace in `cluster`, served by `transport`.
    ///
    /// The first keyspace registered becomes the default for schemas that
    /// name none.
    ///
    /// # Errors
    ///
    /// `MappingError::Configuration` if the cluster is unknown or the
    /// keyspace name is empty or taken.
    pub fn add_keyspace(
        &self,
        cluster: &str,
        name: &str,
        transport: Arc<dyn Transport>,
    ) -> MappingResult<Arc<Keyspace>> {
        if name.is_empty() {
            return Err(MappingError::Configuration("keyspace name must not be empty".to_string()));
        }
        let owner = self
            .cluster(cluster)
            .ok_or_else(|| MappingError::Configuration(format!("cluster '{}' is not registered", cluster)))?;
        let mut keyspaces = self.inner.keyspaces.write();
        if keyspaces.iter().any(|k| k.name == name) {
            return Err(MappingError::Configuration(format!("keyspace '{}' is already registered", name)));
        }
        let keyspace = Arc::new(Keyspace {
            name: name.to_string(),
            cluster: cluster.to_string(),
            transport,
            record_types: RwLock::new(Vec::new()),
        });
        keyspaces.push(Arc::clone(&keyspace));
        owner.keyspaces.write().push(name.to_string());
        info!(keyspace = %keyspace.path(), "registered keyspace");
        Ok(keyspace)
    }

    pub fn keyspace(&self, name: &str) -> Option<Arc<Keyspace>> {
        self.inner.keyspaces.read().iter().find(|k| k.name == name).cloned()
    }

    pub fn keyspaces(&self) -> Vec<Arc<Keyspace>> {
        self.inner.keyspaces.read().clone()
    }

    /// Validate and bind a record type with its generated index types.
    ///
    /// # Errors
    ///
    /// - `MappingError::Configuration` if no usable keyspace is registered
    /// - `MappingError::Schema` for a malformed declaration or a name that is
    ///   already registered
    pub fn register_record_type(&self, schema: RecordSchema) -> MappingResult<Arc<RecordBinding>> {
        let _guard = self.inner.bind_lock.lock();
        let binding = binder::bind_record(self, schema)?;
        self.install(&binding)?;
        info!(
            record_type = %binding.name,
            path = %binding.path(),
            attributes = binding.attributes.len(),
            indexes = binding.indexes.len(),
            "registered record type"
        );
        Ok(binding)
    }

    /// Register a standalone index type.
    ///
    /// # Errors
    ///
    /// Same as [`register_record_type`](Self::register_record_type).
    pub fn register_index_type(&self, schema: IndexSchema) -> MappingResult<Arc<RecordBinding>> {
        let _guard = self.inner.bind_lock.lock();
        let binding = binder::bind_index(self, schema)?;
        self.install(&binding)?;
        info!(
            record_type = %binding.name,
            path = %binding.path(),
            target = binding.index_target().unwrap_or_default(),
            "registered index type"
        );
        Ok(binding)
    }

    fn install(&self, binding: &Arc<RecordBinding>) -> MappingResult<()> {
        let mut types = self.inner.record_types.write();
        let mut new: Vec<&Arc<RecordBinding>> = binding.indexes.iter().map(|(_, b)| b).collect();
        new.push(binding);
        for b in &new {
            if types.contains_key(&b.name) {
                return Err(MappingError::schema(format!("record type '{}' is already registered", b.name)));
            }
        }
        for b in new {
            types.insert(b.name.clone(), Arc::clone(b));
            b.keyspace.record_types.write().push(b.name.clone());
        }
        Ok(())
    }

    /// Binding of a registered type.
    ///
    /// # Errors
    ///
    /// `MappingError::Schema` if no type of that name is registered.
    pub fn record_type(&self, name: &str) -> MappingResult<Arc<RecordBinding>> {
        self.inner
            .record_types
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| MappingError::schema(format!("record type '{}' is not registered", name)))
    }

    /// All registered bindings, ordered by name.
    pub fn record_types(&self) -> Vec<Arc<RecordBinding>> {
        let mut types: Vec<Arc<RecordBinding>> = self.inner.record_types.read().values().cloned().collect();
        types.sort_by(|a, b| a.name.cmp(&b.name));
        types
    }

    /// Empty record of a registered type.
    pub fn new_record(&self, record_type: &str) -> MappingResult<Record> {
        Ok(Record::new(self.record_type(record_type)?))
    }

    /// Load the row a reference points at. `None` if the row holds no
    /// columns.
    pub fn resolve(&self, reference: &RecordRef) -> MappingResult<Option<Record>> {
        let binding = self.record_type(&reference.record_type)?;
        let mut loaded = load_multi(&binding, &[reference.row_key.clone()], &LoadOptions::default())?;
        Ok(loaded.pop())
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::with_config(MappingConfig::default())
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("config", &self.inner.config)
            .field("keyspaces", &self.keyspaces().iter().map(|k| k.path()).collect::<Vec<_>>())
            .field("record_types", &self.inner.record_types.read().len())
            .finish()
    }
}
