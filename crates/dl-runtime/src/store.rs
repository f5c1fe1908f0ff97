use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use dl_core::{DicelangError, Namespace, StoreImage, Value, STORE_SCHEMA_V1};
use parking_lot::{Mutex, RwLock};
use tracing::{debug, info};

mod backend;

pub use backend::{JsonFileBackend, MemoryBackend, StoreBackend};

type Bindings = BTreeMap<String, Value>;

/// Tiered, durable key/value store shared by every interpreter invocation.
///
/// Each tier sits behind its own lock so that independent tiers never
/// contend; `image()` and `restore()` take all four locks in tier order.
pub struct VariableStore {
    core: RwLock<Bindings>,
    global: RwLock<Bindings>,
    shared: RwLock<BTreeMap<String, Bindings>>,
    private: RwLock<BTreeMap<String, BTreeMap<String, Bindings>>>,
    backend: Option<Arc<dyn StoreBackend>>,
    /// Held from `image()` until the backend write returns, so images
    /// reach the medium in the order they were taken.
    persist: Mutex<()>,
}

impl Default for VariableStore {
    fn default() -> Self {
        Self::new()
    }
}

impl VariableStore {
    pub fn new() -> Self {
        Self {
            core: RwLock::new(BTreeMap::new()),
            global: RwLock::new(BTreeMap::new()),
            shared: RwLock::new(BTreeMap::new()),
            private: RwLock::new(BTreeMap::new()),
            backend: None,
            persist: Mutex::new(()),
        }
    }

    pub fn with_backend(backend: Arc<dyn StoreBackend>) -> Self {
        Self {
            backend: Some(backend),
            ..Self::new()
        }
    }

    /// Builds a store over `backend`, restoring the last saved image if any.
    pub fn open(backend: Arc<dyn StoreBackend>) -> Result<Self, DicelangError> {
        let store = Self::with_backend(Arc::clone(&backend));
        if let Some(image) = backend.load()? {
            store.restore(image)?;
            debug!(entries = store.image().entry_count(), "store restored");
        }
        Ok(store)
    }

    pub fn get(&self, namespace: &Namespace, name: &str) -> Value {
        let found = match namespace {
            Namespace::Core => self.core.read().get(name).cloned(),
            Namespace::Global => self.global.read().get(name).cloned(),
            Namespace::Shared { server } => self
                .shared
                .read()
                .get(server)
                .and_then(|bindings| bindings.get(name))
                .cloned(),
            Namespace::Private { server, user } => self
                .private
                .read()
                .get(server)
                .and_then(|users| users.get(user))
                .and_then(|bindings| bindings.get(name))
                .cloned(),
        };
        found.unwrap_or(Value::Undefined)
    }

    pub fn put(&self, namespace: &Namespace, name: &str, value: Value) -> Result<(), DicelangError> {
        match namespace {
            Namespace::Core => return Err(core_write_denied(name)),
            Namespace::Global => {
                self.global.write().insert(name.to_string(), value);
            }
            Namespace::Shared { server } => {
                self.shared
                    .write()
                    .entry(server.clone())
                    .or_default()
                    .insert(name.to_string(), value);
            }
            Namespace::Private { server, user } => {
                self.private
                    .write()
                    .entry(server.clone())
                    .or_default()
                    .entry(user.clone())
                    .or_default()
                    .insert(name.to_string(), value);
            }
        }
        Ok(())
    }

    /// Removes `name` from `namespace`, returning what was bound
    /// (`Value::Undefined` when nothing was).
    pub fn drop(&self, namespace: &Namespace, name: &str) -> Result<Value, DicelangError> {
        let removed = match namespace {
            Namespace::Core => return Err(core_write_denied(name)),
            Namespace::Global => self.global.write().remove(name),
            Namespace::Shared { server } => {
                let mut shared = self.shared.write();
                let removed = shared.get_mut(server).and_then(|b| b.remove(name));
                if shared.get(server).is_some_and(BTreeMap::is_empty) {
                    shared.remove(server);
                }
                removed
            }
            Namespace::Private { server, user } => {
                let mut private = self.private.write();
                let mut removed = None;
                if let Some(users) = private.get_mut(server) {
                    removed = users.get_mut(user).and_then(|b| b.remove(name));
                    if users.get(user).is_some_and(BTreeMap::is_empty) {
                        users.remove(user);
                    }
                    if users.is_empty() {
                        private.remove(server);
                    }
                }
                removed
            }
        };
        Ok(removed.unwrap_or(Value::Undefined))
    }

    pub fn keys(&self, namespace: &Namespace) -> BTreeSet<String> {
        match namespace {
            Namespace::Core => self.core.read().keys().cloned().collect(),
            Namespace::Global => self.global.read().keys().cloned().collect(),
            Namespace::Shared { server } => self
                .shared
                .read()
                .get(server)
                .map(|bindings| bindings.keys().cloned().collect())
                .unwrap_or_default(),
            Namespace::Private { server, user } => self
                .private
                .read()
                .get(server)
                .and_then(|users| users.get(user))
                .map(|bindings| bindings.keys().cloned().collect())
                .unwrap_or_default(),
        }
    }

    /// Privileged write into the core tier, used when loading the standard
    /// library. Program text can never reach this path.
    pub fn install_core(&self, name: &str, value: Value) {
        self.core.write().insert(name.to_string(), value);
    }

    /// Swaps in a whole core library, dropping entries a restored image
    /// carried over from an older library.
    pub fn replace_core(&self, library: Bindings) {
        *self.core.write() = library;
    }

    pub fn image(&self) -> StoreImage {
        let core = self.core.read();
        let global = self.global.read();
        let shared = self.shared.read();
        let private = self.private.read();
        StoreImage {
            schema_version: STORE_SCHEMA_V1.to_string(),
            core: core.clone(),
            global: global.clone(),
            shared: shared.clone(),
            private: private.clone(),
        }
    }

    pub fn restore(&self, image: StoreImage) -> Result<(), DicelangError> {
        if image.schema_version != STORE_SCHEMA_V1 {
            return Err(DicelangError::storage(format!(
                "Unsupported store schema \"{}\".",
                image.schema_version
            )));
        }
        let mut core = self.core.write();
        let mut global = self.global.write();
        let mut shared = self.shared.write();
        let mut private = self.private.write();
        *core = image.core;
        *global = image.global;
        *shared = image.shared;
        *private = image.private;
        Ok(())
    }

    pub fn save(&self) -> Result<(), DicelangError> {
        let backend = self.backend()?;
        let _persist = self.persist.lock();
        let image = self.image();
        backend.save(&image)?;
        info!(entries = image.entry_count(), "store saved");
        Ok(())
    }

    /// Writes the primary image and an additional point-in-time copy.
    pub fn backup(&self) -> Result<(), DicelangError> {
        let backend = self.backend()?;
        let _persist = self.persist.lock();
        let image = self.image();
        backend.save(&image)?;
        backend.backup(&image)?;
        info!(entries = image.entry_count(), "store backed up");
        Ok(())
    }

    pub fn is_durable(&self) -> bool {
        self.backend.is_some()
    }

    fn backend(&self) -> Result<&Arc<dyn StoreBackend>, DicelangError> {
        self.backend
            .as_ref()
            .ok_or_else(|| DicelangError::storage("No durable medium is configured."))
    }
}

fn core_write_denied(name: &str) -> DicelangError {
    DicelangError::privilege(format!(
        "Cannot modify \"{}\": the core tier is read-only.",
        name
    ))
}

#[cfg(test)]
mod store_tests {
    use super::*;
    use dl_core::{BinaryOp, ErrorKind, Function, Identity, Node, Tier};
    use pretty_assertions::assert_eq;

    fn private(user: &str, server: &str) -> Namespace {
        Namespace::resolve(Tier::Private, &Identity::new(user, server))
    }

    #[test]
    fn private_tiers_are_isolated_per_user_and_server() {
        let store = VariableStore::new();
        store
            .put(&private("alice", "guild"), "hp", Value::Integer(10))
            .expect("put should pass");
        assert_eq!(store.get(&private("alice", "guild"), "hp"), Value::Integer(10));
        assert_eq!(store.get(&private("bob", "guild"), "hp"), Value::Undefined);
        assert_eq!(store.get(&private("alice", "other"), "hp"), Value::Undefined);
    }

    #[test]
    fn shared_tier_is_keyed_by_server() {
        let store = VariableStore::new();
        let guild = Namespace::resolve(Tier::Shared, &Identity::new("alice", "guild"));
        store
            .put(&guild, "boss", Value::from("dragon"))
            .expect("put should pass");
        let same_server = Namespace::resolve(Tier::Shared, &Identity::new("bob", "guild"));
        let other_server = Namespace::resolve(Tier::Shared, &Identity::new("bob", "elsewhere"));
        assert_eq!(store.get(&same_server, "boss"), Value::from("dragon"));
        assert_eq!(store.get(&other_server, "boss"), Value::Undefined);
    }

    #[test]
    fn core_writes_are_rejected() {
        let store = VariableStore::new();
        let error = store
            .put(&Namespace::Core, "pi", Value::Float(3.0))
            .expect_err("core put should fail");
        assert_eq!(error.kind, ErrorKind::PrivilegeError);
        let error = store
            .drop(&Namespace::Core, "pi")
            .expect_err("core drop should fail");
        assert_eq!(error.kind, ErrorKind::PrivilegeError);
    }

    #[test]
    fn drop_returns_previous_value_and_prunes_empty_maps() {
        let store = VariableStore::new();
        let ns = private("alice", "guild");
        store.put(&ns, "x", Value::Integer(1)).expect("put should pass");
        assert_eq!(store.drop(&ns, "x").expect("drop should pass"), Value::Integer(1));
        assert_eq!(store.drop(&ns, "x").expect("drop should pass"), Value::Undefined);
        assert!(store.image().private.is_empty());
    }

    #[test]
    fn keys_list_names_in_order() {
        let store = VariableStore::new();
        store
            .put(&Namespace::Global, "b", Value::Integer(2))
            .expect("put should pass");
        store
            .put(&Namespace::Global, "a", Value::Integer(1))
            .expect("put should pass");
        store.install_core("roll", Value::Boolean(true));
        let keys: Vec<String> = store.keys(&Namespace::Global).into_iter().collect();
        assert_eq!(keys, vec!["a".to_string(), "b".to_string()]);
        assert!(store.keys(&Namespace::Core).contains("roll"));
    }

    #[test]
    fn save_and_reload_round_trip_through_backend() {
        let backend = Arc::new(MemoryBackend::new());
        let store = VariableStore::with_backend(backend.clone());
        store
            .put(&private("alice", "guild"), "hp", Value::Integer(7))
            .expect("put should pass");
        store
            .put(&Namespace::Global, "greeting", Value::from("hi"))
            .expect("put should pass");
        store.save().expect("save should pass");

        let reopened = VariableStore::open(backend).expect("open should pass");
        assert_eq!(reopened.image(), store.image());
        assert_eq!(
            reopened.get(&private("alice", "guild"), "hp"),
            Value::Integer(7)
        );
    }

    #[test]
    fn json_file_round_trip_restores_all_four_tiers() {
        let nanos = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .expect("clock should be after epoch")
            .as_nanos();
        let path = std::env::temp_dir()
            .join(format!("dicelang-store-roundtrip-{}", nanos))
            .join("store.json");
        let backend: Arc<dyn StoreBackend> = Arc::new(JsonFileBackend::new(&path));
        let store = VariableStore::with_backend(Arc::clone(&backend));

        store.install_core("pi", Value::Float(3.25));
        store
            .put(&Namespace::Global, "motd", Value::from("roll well"))
            .expect("put should pass");
        let guild = Namespace::resolve(Tier::Shared, &Identity::new("alice", "guild"));
        store
            .put(
                &guild,
                "loot",
                Value::List(vec![Value::Integer(3), Value::Boolean(true)]),
            )
            .expect("put should pass");
        let half = Value::Function(Function {
            name: "half".to_string(),
            params: vec!["n".to_string()],
            body: vec![Node::binary(
                BinaryOp::Div,
                Node::ident("n"),
                Node::float(2.0),
            )],
            tier: Tier::Private,
        });
        store
            .put(&private("alice", "guild"), "half", half.clone())
            .expect("put should pass");
        store
            .put(&private("alice", "guild"), "ratio", Value::Float(0.125))
            .expect("put should pass");
        store.save().expect("save should pass");

        let reopened = VariableStore::open(backend).expect("open should pass");
        assert_eq!(reopened.image(), store.image());
        assert_eq!(reopened.get(&Namespace::Core, "pi"), Value::Float(3.25));
        assert_eq!(reopened.get(&private("alice", "guild"), "half"), half);
        assert_eq!(reopened.image().entry_count(), 5);
    }

    #[test]
    fn concurrent_saves_through_one_store_all_succeed() {
        let nanos = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .expect("clock should be after epoch")
            .as_nanos();
        let path = std::env::temp_dir()
            .join(format!("dicelang-store-concurrent-{}", nanos))
            .join("store.json");
        let store = Arc::new(VariableStore::with_backend(Arc::new(JsonFileBackend::new(
            &path,
        ))));
        let handles = (0..8)
            .map(|worker| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    let mut failures = 0;
                    for step in 0..50 {
                        store
                            .put(&Namespace::Global, "last", Value::Integer(worker * 100 + step))
                            .expect("put should pass");
                        if store.save().is_err() {
                            failures += 1;
                        }
                    }
                    failures
                })
            })
            .collect::<Vec<_>>();
        let failures: usize = handles
            .into_iter()
            .map(|handle| handle.join().expect("worker should finish"))
            .sum();
        assert_eq!(failures, 0);

        store.save().expect("final save should pass");
        let reopened = VariableStore::open(Arc::new(JsonFileBackend::new(&path)))
            .expect("open should pass");
        assert_eq!(reopened.image(), store.image());
    }

    #[test]
    fn replace_core_drops_stale_entries() {
        let store = VariableStore::new();
        store.install_core("old", Value::Integer(1));
        store.replace_core(BTreeMap::from([("new".to_string(), Value::Integer(2))]));
        assert_eq!(store.get(&Namespace::Core, "old"), Value::Undefined);
        assert_eq!(store.get(&Namespace::Core, "new"), Value::Integer(2));
    }

    #[test]
    fn backup_also_refreshes_primary_image() {
        let backend = Arc::new(MemoryBackend::new());
        let store = VariableStore::with_backend(backend.clone());
        store
            .put(&Namespace::Global, "x", Value::Integer(1))
            .expect("put should pass");
        store.backup().expect("backup should pass");
        assert_eq!(backend.backup_count(), 1);
        assert_eq!(backend.saved_image(), Some(store.image()));
    }

    #[test]
    fn unavailable_medium_surfaces_storage_error() {
        let backend = Arc::new(MemoryBackend::new());
        backend.set_available(false);
        let store = VariableStore::with_backend(backend);
        let error = store.save().expect_err("save should fail");
        assert_eq!(error.kind, ErrorKind::StorageError);

        let error = VariableStore::new()
            .save()
            .expect_err("save without medium should fail");
        assert_eq!(error.kind, ErrorKind::StorageError);
    }

    #[test]
    fn restore_rejects_unknown_schema() {
        let store = VariableStore::new();
        let image = StoreImage {
            schema_version: "dicelang-store.v0".to_string(),
            ..StoreImage::default()
        };
        let error = store.restore(image).expect_err("restore should fail");
        assert_eq!(error.kind, ErrorKind::StorageError);
    }
}
