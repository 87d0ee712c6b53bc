//! Registry of live personas for hosts that serve concurrent requests.
//!
//! Each persona sits behind its own async mutex: calls on one persona are
//! serialized, calls on different personas run in parallel. Bulk
//! operations clone the handles first so no map shard is locked across an
//! `.await`.

use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::Mutex as StoreLock;
use tokio::sync::Mutex;
use tracing::{debug, info};

use anima_core::persistence::PersonaStore;
use anima_core::{PersonaId, PersonaIdentity, PersonaSnapshot};

use crate::error::Result;
use crate::persona::Persona;
use crate::runtime::PersonaRuntime;

/// Shared handle to one persona.
pub type PersonaHandle = Arc<Mutex<Persona>>;

/// Concurrent map from [`PersonaId`] to persona.
#[derive(Debug)]
pub struct PersonaRegistry {
    personas: DashMap<PersonaId, PersonaHandle>,
    runtime: PersonaRuntime,
}

impl PersonaRegistry {
    /// Empty registry; new personas share `runtime`.
    #[must_use]
    pub fn new(runtime: PersonaRuntime) -> Self {
        Self {
            personas: DashMap::new(),
            runtime,
        }
    }

    /// The runtime personas are created with.
    #[must_use]
    pub fn runtime(&self) -> &PersonaRuntime {
        &self.runtime
    }

    /// Create and register an uninitialized persona.
    pub fn create(&self, identity: PersonaIdentity) -> (PersonaId, PersonaHandle) {
        let persona = Persona::new(identity, self.runtime.clone());
        let id = persona.id();
        let handle = Arc::new(Mutex::new(persona));
        self.personas.insert(id, Arc::clone(&handle));
        debug!(%id, "Persona registered");
        (id, handle)
    }

    /// Register a persona rebuilt from a snapshot, replacing any persona with
    /// the same id.
    pub fn restore(&self, snapshot: PersonaSnapshot) -> PersonaHandle {
        let persona = Persona::restore(snapshot, self.runtime.clone());
        let id = persona.id();
        let handle = Arc::new(Mutex::new(persona));
        self.personas.insert(id, Arc::clone(&handle));
        handle
    }

    /// Handle for `id`, if registered.
    #[must_use]
    pub fn get(&self, id: &PersonaId) -> Option<PersonaHandle> {
        self.personas.get(id).map(|entry| Arc::clone(entry.value()))
    }

    /// Unregister `id`. In-flight calls holding the handle still complete.
    pub fn remove(&self, id: &PersonaId) -> bool {
        self.personas.remove(id).is_some()
    }

    /// Number of registered personas.
    #[must_use]
    pub fn len(&self) -> usize {
        self.personas.len()
    }

    /// Whether no personas are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.personas.is_empty()
    }

    /// Registered ids, in no particular order.
    #[must_use]
    pub fn ids(&self) -> Vec<PersonaId> {
        self.personas.iter().map(|entry| *entry.key()).collect()
    }

    fn handles(&self) -> Vec<PersonaHandle> {
        self.personas.iter().map(|entry| Arc::clone(entry.value())).collect()
    }

    /// Decay every persona's mood once. Returns how many were ticked.
    pub async fn tick_all(&self) -> usize {
        let handles = self.handles();
        for handle in &handles {
            handle.lock().await.tick();
        }
        handles.len()
    }

    /// Snapshot every persona.
    pub async fn snapshot_all(&self) -> Vec<PersonaSnapshot> {
        let mut out = Vec::with_capacity(self.personas.len());
        for handle in self.handles() {
            out.push(handle.lock().await.snapshot());
        }
        out
    }

    /// Persist every persona to `store`. Returns how many were saved.
    ///
    /// The store lock is taken only once every snapshot is in hand, so the
    /// future is `Send` and can run as a spawned periodic task.
    ///
    /// # Errors
    ///
    /// Returns the first store error; earlier saves are kept.
    pub async fn save_all(&self, store: &StoreLock<PersonaStore>) -> Result<usize> {
        let snapshots = self.snapshot_all().await;
        save_snapshots(&store.lock(), &snapshots)?;
        info!(count = snapshots.len(), "Personas saved");
        Ok(snapshots.len())
    }

    /// Register every persona held in `store`. Returns how many were loaded.
    ///
    /// # Errors
    ///
    /// Returns the first store error, including checksum mismatches.
    pub fn load_all(&self, store: &PersonaStore) -> Result<usize> {
        let mut loaded = 0;
        for id in store.list_ids()? {
            if let Some(snapshot) = store.load(&id)? {
                self.restore(snapshot);
                loaded += 1;
            }
        }
        info!(count = loaded, "Personas loaded");
        Ok(loaded)
    }
}

fn save_snapshots(store: &PersonaStore, snapshots: &[PersonaSnapshot]) -> Result<()> {
    for snapshot in snapshots {
        store.save(snapshot)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use anima_core::config::PersistenceConfig;
    use anima_core::{AnimaConfig, Originality};
    use anima_llm::ScriptedModel;

    fn registry() -> PersonaRegistry {
        let runtime = PersonaRuntime::new(Arc::new(ScriptedModel::new()), AnimaConfig::default())
            .expect("runtime");
        PersonaRegistry::new(runtime)
    }

    #[tokio::test]
    async fn create_get_remove() {
        let reg = registry();
        let (id, handle) = reg.create(PersonaIdentity::new("Mika", "female", Originality::Original));
        assert_eq!(reg.len(), 1);
        assert!(Arc::ptr_eq(&handle, &reg.get(&id).expect("registered")));
        assert!(reg.remove(&id));
        assert!(reg.get(&id).is_none());
        assert!(!reg.remove(&id));
        assert!(reg.is_empty());
    }

    #[tokio::test]
    async fn tick_all_decays_everyone() {
        let reg = registry();
        let (_, a) = reg.create(PersonaIdentity::new("A", "male", Originality::Original));
        let (_, b) = reg.create(PersonaIdentity::new("B", "female", Originality::Original));
        a.lock().await.apply_stimulus(1.0, 0.0, 0.0);
        b.lock().await.apply_stimulus(-1.0, 0.0, 0.0);

        assert_eq!(reg.tick_all().await, 2);
        assert!((a.lock().await.mood().pleasure() - 0.9).abs() < 1e-6);
        assert!((b.lock().await.mood().pleasure() + 0.9).abs() < 1e-6);
    }

    fn memory_store() -> StoreLock<PersonaStore> {
        StoreLock::new(PersonaStore::open_in_memory(&PersistenceConfig::default()).expect("store"))
    }

    #[tokio::test]
    async fn store_round_trip() {
        let store = memory_store();
        let reg = registry();
        let (id, handle) = reg.create(PersonaIdentity::new("Mika", "female", Originality::Existing));
        handle.lock().await.apply_stimulus(0.6, 0.3, 0.2);
        assert_eq!(reg.save_all(&store).await.expect("save"), 1);

        let fresh = registry();
        assert_eq!(fresh.load_all(&store.lock()).expect("load"), 1);
        let restored = fresh.get(&id).expect("restored");
        let persona = restored.lock().await;
        assert_eq!(persona.identity().originality, Originality::Existing);
        assert!((persona.mood().pleasure() - 0.6).abs() < 1e-6);
    }

    #[tokio::test]
    async fn periodic_save_runs_in_a_spawned_task() {
        let store = Arc::new(memory_store());
        let reg = Arc::new(registry());
        reg.create(PersonaIdentity::new("A", "male", Originality::Original));
        reg.create(PersonaIdentity::new("B", "female", Originality::Original));

        let task = tokio::spawn({
            let reg = Arc::clone(&reg);
            let store = Arc::clone(&store);
            async move { reg.save_all(&store).await }
        });
        assert_eq!(task.await.expect("join").expect("save"), 2);
        assert_eq!(store.lock().count().expect("count"), 2);
    }
}
