//! The orchestrator-owned store of service definitions and runtime records.
//!
//! One entry per registered name. The registry is constructed once at the
//! composition root and held by a single orchestrator instance; there is no
//! ambient/static state.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use crate::errors::{OrchestratorError, Result};
use crate::service::ServiceDefinition;
use crate::state::ServiceRecord;

/// Definition plus runtime record for one service.
pub struct ServiceEntry {
    pub definition: ServiceDefinition,
    record: Mutex<ServiceRecord>,
    /// Serializes lifecycle operations targeting this service. Operations on
    /// different services proceed concurrently.
    pub(crate) op_lock: tokio::sync::Mutex<()>,
}

impl ServiceEntry {
    fn new(definition: ServiceDefinition, record: ServiceRecord) -> Self {
        Self {
            definition,
            record: Mutex::new(record),
            op_lock: tokio::sync::Mutex::new(()),
        }
    }

    /// Read or mutate the record under its lock.
    ///
    /// Mutation is reserved for the orchestrator's transition function;
    /// other callers only read.
    pub fn with_record<T>(&self, f: impl FnOnce(&mut ServiceRecord) -> T) -> T {
        f(&mut self.record.lock())
    }

    pub fn record(&self) -> ServiceRecord {
        self.record.lock().clone()
    }
}

/// Map of service name → entry.
#[derive(Default)]
pub struct ServiceRegistry {
    entries: RwLock<HashMap<String, Arc<ServiceEntry>>>,
}

impl ServiceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a definition. Idempotent per name: a later registration
    /// replaces the definition but keeps the existing runtime record.
    /// Rejected while the service is mid-transition, since swapping the
    /// definition under a running operation would be unsound.
    pub fn register(&self, definition: ServiceDefinition) -> Result<Arc<ServiceEntry>> {
        let mut entries = self.entries.write();

        let record = match entries.get(&definition.name) {
            Some(existing) => {
                let record = existing.record();
                if record.status.is_transitioning() {
                    return Err(OrchestratorError::ServiceBusy(definition.name.clone()));
                }
                record
            }
            None => ServiceRecord::default(),
        };

        let entry = Arc::new(ServiceEntry::new(definition, record));
        entries.insert(entry.definition.name.clone(), Arc::clone(&entry));
        Ok(entry)
    }

    pub fn get(&self, name: &str) -> Option<Arc<ServiceEntry>> {
        self.entries.read().get(name).cloned()
    }

    pub fn entries(&self) -> Vec<Arc<ServiceEntry>> {
        self.entries.read().values().cloned().collect()
    }

    /// Declared dependency edges, as consumed by the dependency resolver.
    pub fn dependency_map(&self) -> HashMap<String, Vec<String>> {
        self.entries
            .read()
            .values()
            .map(|e| (e.definition.name.clone(), e.definition.depends_on.clone()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}
