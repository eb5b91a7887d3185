//! Thread-safe store facade.
//!
//! [`SecureStore`] bundles the envelope codec, the replica set, and the
//! namespace manager behind one entry point and serializes every public
//! operation under a caller-supplied mutex.  The mutex is *borrowed*, not
//! owned: the caller may share it with other subsystems operating on the
//! same directories, and the total order it imposes is what makes
//! store-then-retrieve behave sequentially across threads.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Mutex;
//! use trivault::{HostPlatform, SecureStore};
//!
//! # fn example() -> trivault::Result<()> {
//! let mutex = Mutex::new(());
//! let platform = HostPlatform::new();
//! let store = SecureStore::open(&platform, &mutex)?;
//!
//! store.store("greeting", "hello")?;
//! let (value, _consistency) = store.retrieve_string("greeting")?;
//! assert_eq!(value, "hello");
//! # Ok(())
//! # }
//! ```

use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::{debug, info};

use crate::envelope::EnvelopeCodec;
use crate::error::{Result, StoreError};
use crate::namespace::{KeyEntry, ModulePath, Namespace};
use crate::platform::Platform;
use crate::replica::{self, Consistency, LoadStatus, ReplicaSet};
use crate::value::{TypeTag, Value};

/// Longest accepted data key.  The on-disk name is `.<key>.jkl`, which must
/// stay inside common 255-byte filename limits.
const MAX_DATA_KEY_LEN: usize = 250;

/// Thread-safe secure store over three replica bases.
pub struct SecureStore<'m> {
    mutex: &'m Mutex<()>,
    codec: EnvelopeCodec,
    replicas: ReplicaSet,
    namespace: Namespace,
}

impl<'m> SecureStore<'m> {
    /// Open a store using the given platform capabilities and the shared
    /// mutex.
    ///
    /// All capabilities are read once, here.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::CapabilityFailure`] when the platform cannot
    /// supply base paths, user name, or machine id.
    pub fn open(platform: &dyn Platform, mutex: &'m Mutex<()>) -> Result<Self> {
        let bases = platform.base_paths()?;
        let user_name = platform.user_name()?;
        let machine_id = platform.machine_id()?;

        info!(
            base0 = %bases[0].display(),
            base1 = %bases[1].display(),
            base2 = %bases[2].display(),
            "secure store opened"
        );

        Ok(Self {
            mutex,
            codec: EnvelopeCodec::new(user_name, machine_id),
            replicas: ReplicaSet::new(bases.clone()),
            namespace: Namespace::new(bases),
        })
    }

    fn lock(&self) -> MutexGuard<'m, ()> {
        // A poisoned mutex only means another holder panicked; the on-disk
        // state is already covered by voting, so keep going.
        self.mutex.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn validate_data_key(data_key: &str) -> Result<()> {
        if data_key.is_empty() {
            return Err(StoreError::InvalidDataKey {
                reason: "data key must not be empty".into(),
            });
        }
        if data_key.len() > MAX_DATA_KEY_LEN {
            return Err(StoreError::InvalidDataKey {
                reason: format!("data key exceeds {MAX_DATA_KEY_LEN} bytes"),
            });
        }
        if data_key.contains('/') || data_key.contains('\\') {
            return Err(StoreError::InvalidDataKey {
                reason: "data key must not contain path separators".into(),
            });
        }
        if data_key.starts_with('.') {
            return Err(StoreError::InvalidDataKey {
                reason: "data key must not start with a dot".into(),
            });
        }
        Ok(())
    }

    // -- Store --------------------------------------------------------------

    /// Encrypt and store a value at the root under `data_key`.
    ///
    /// A partial replica write (at least one base landed) still succeeds;
    /// the shortfall shows up as drift on the next read.
    pub fn store(&self, data_key: &str, value: impl Into<Value>) -> Result<()> {
        self.store_in(&ModulePath::root(), data_key, value.into())
    }

    /// Encrypt and store a value inside a module.  The module directory
    /// must already exist (see [`create_module`](Self::create_module)).
    pub fn store_to_module(
        &self,
        module: &str,
        data_key: &str,
        value: impl Into<Value>,
    ) -> Result<()> {
        self.store_in(&ModulePath::parse(module)?, data_key, value.into())
    }

    fn store_in(&self, module: &ModulePath, data_key: &str, value: Value) -> Result<()> {
        Self::validate_data_key(data_key)?;
        let _guard = self.lock();

        let ciphertext = self.codec.seal(data_key, value.tag(), &value.to_text())?;
        self.replicas.write(module, data_key, &ciphertext)?;

        info!(data_key, module = %module, tag = %value.tag(), "record stored");
        Ok(())
    }

    // -- Retrieve -----------------------------------------------------------

    /// Read a value of the expected type from the root.
    ///
    /// # Errors
    ///
    /// [`StoreError::NotFound`] when no replica yields a valid envelope;
    /// [`StoreError::TypeMismatch`] when envelopes exist but carry a
    /// different type tag, or the value text fails to parse.
    pub fn retrieve(&self, data_key: &str, expected: TypeTag) -> Result<(Value, Consistency)> {
        self.retrieve_in(&ModulePath::root(), data_key, expected)
    }

    /// Read a value of the expected type from a module.
    pub fn retrieve_from_module(
        &self,
        module: &str,
        data_key: &str,
        expected: TypeTag,
    ) -> Result<(Value, Consistency)> {
        self.retrieve_in(&ModulePath::parse(module)?, data_key, expected)
    }

    fn retrieve_in(
        &self,
        module: &ModulePath,
        data_key: &str,
        expected: TypeTag,
    ) -> Result<(Value, Consistency)> {
        Self::validate_data_key(data_key)?;
        let _guard = self.lock();

        let (status, raw) = self.replicas.read(module, data_key);
        if status == LoadStatus::AllMissing {
            debug!(data_key, module = %module, "no replica present");
            return Err(StoreError::NotFound {
                data_key: data_key.to_string(),
            });
        }

        let (text, consistency) = replica::vote(&self.codec, data_key, &raw, expected)?;
        let value =
            Value::from_text(expected, &text).ok_or_else(|| StoreError::TypeMismatch {
                data_key: data_key.to_string(),
                expected,
            })?;

        debug!(data_key, module = %module, consistency = ?consistency, "record retrieved");
        Ok((value, consistency))
    }

    // -- Typed retrieval helpers --------------------------------------------

    /// Retrieve a string from the root.
    pub fn retrieve_string(&self, data_key: &str) -> Result<(String, Consistency)> {
        let (value, consistency) = self.retrieve(data_key, TypeTag::Str)?;
        Ok((value.into_str().unwrap_or_default(), consistency))
    }

    /// Retrieve an `i64` from the root.
    pub fn retrieve_i64(&self, data_key: &str) -> Result<(i64, Consistency)> {
        let (value, consistency) = self.retrieve(data_key, TypeTag::I64)?;
        Ok((value.into_i64().unwrap_or_default(), consistency))
    }

    /// Retrieve an `f32` from the root.
    pub fn retrieve_f32(&self, data_key: &str) -> Result<(f32, Consistency)> {
        let (value, consistency) = self.retrieve(data_key, TypeTag::F32)?;
        Ok((value.into_f32().unwrap_or_default(), consistency))
    }

    /// Retrieve an `f64` from the root.
    pub fn retrieve_f64(&self, data_key: &str) -> Result<(f64, Consistency)> {
        let (value, consistency) = self.retrieve(data_key, TypeTag::F64)?;
        Ok((value.into_f64().unwrap_or_default(), consistency))
    }

    /// Retrieve a boolean from the root.
    pub fn retrieve_bool(&self, data_key: &str) -> Result<(bool, Consistency)> {
        let (value, consistency) = self.retrieve(data_key, TypeTag::Bool)?;
        Ok((value.into_bool().unwrap_or_default(), consistency))
    }

    /// Retrieve a string from a module.
    pub fn retrieve_string_from_module(
        &self,
        module: &str,
        data_key: &str,
    ) -> Result<(String, Consistency)> {
        let (value, consistency) = self.retrieve_from_module(module, data_key, TypeTag::Str)?;
        Ok((value.into_str().unwrap_or_default(), consistency))
    }

    /// Retrieve an `i64` from a module.
    pub fn retrieve_i64_from_module(
        &self,
        module: &str,
        data_key: &str,
    ) -> Result<(i64, Consistency)> {
        let (value, consistency) = self.retrieve_from_module(module, data_key, TypeTag::I64)?;
        Ok((value.into_i64().unwrap_or_default(), consistency))
    }

    /// Retrieve an `f32` from a module.
    pub fn retrieve_f32_from_module(
        &self,
        module: &str,
        data_key: &str,
    ) -> Result<(f32, Consistency)> {
        let (value, consistency) = self.retrieve_from_module(module, data_key, TypeTag::F32)?;
        Ok((value.into_f32().unwrap_or_default(), consistency))
    }

    /// Retrieve an `f64` from a module.
    pub fn retrieve_f64_from_module(
        &self,
        module: &str,
        data_key: &str,
    ) -> Result<(f64, Consistency)> {
        let (value, consistency) = self.retrieve_from_module(module, data_key, TypeTag::F64)?;
        Ok((value.into_f64().unwrap_or_default(), consistency))
    }

    /// Retrieve a boolean from a module.
    pub fn retrieve_bool_from_module(
        &self,
        module: &str,
        data_key: &str,
    ) -> Result<(bool, Consistency)> {
        let (value, consistency) = self.retrieve_from_module(module, data_key, TypeTag::Bool)?;
        Ok((value.into_bool().unwrap_or_default(), consistency))
    }

    // -- Delete -------------------------------------------------------------

    /// Best-effort removal of a root record from every replica.
    pub fn delete(&self, data_key: &str) -> Result<()> {
        Self::validate_data_key(data_key)?;
        let _guard = self.lock();
        self.replicas.remove(&ModulePath::root(), data_key);
        info!(data_key, "record deleted");
        Ok(())
    }

    /// Best-effort removal of a module record from every replica.
    pub fn delete_from_module(&self, module: &str, data_key: &str) -> Result<()> {
        Self::validate_data_key(data_key)?;
        let module = ModulePath::parse(module)?;
        let _guard = self.lock();
        self.replicas.remove(&module, data_key);
        info!(data_key, module = %module, "record deleted");
        Ok(())
    }

    /// Remove every record and module, including the base directories
    /// themselves.  Subsequent root-level stores recreate the bases.
    pub fn delete_all(&self) -> Result<()> {
        let _guard = self.lock();
        self.namespace.delete_all()
    }

    // -- Namespace ----------------------------------------------------------

    /// Create module `parent/name` on every base.  `parent` may be `""` or
    /// `"*"` for the root.  Idempotent.
    pub fn create_module(&self, parent: &str, name: &str) -> Result<()> {
        let _guard = self.lock();
        self.namespace.create_module(parent, name)?;
        Ok(())
    }

    /// Recursively remove a module tree from every base.
    pub fn remove_module(&self, path: &str) -> Result<()> {
        let path = ModulePath::parse(path)?;
        let _guard = self.lock();
        self.namespace.remove_module(&path)
    }

    /// Delete every record under a module tree while keeping the module
    /// structure itself.
    pub fn delete_all_data_from_module(&self, path: &str) -> Result<()> {
        let path = ModulePath::parse(path)?;
        let _guard = self.lock();
        self.namespace.purge_module_records(&path);
        Ok(())
    }

    // -- Queries ------------------------------------------------------------

    /// Every stored record, from the best-informed replica.
    pub fn get_all_keys(&self) -> Vec<KeyEntry> {
        let _guard = self.lock();
        self.namespace.list_all_keys()
    }

    /// Records in a module and all of its submodules.
    pub fn get_keys_in_module(&self, module: &str) -> Result<Vec<KeyEntry>> {
        let module = ModulePath::parse(module)?;
        let _guard = self.lock();
        Ok(self.namespace.list_keys_in_module(&module))
    }

    /// Records directly inside a module (no deeper descendants).
    pub fn get_direct_keys_in_module(&self, module: &str) -> Result<Vec<KeyEntry>> {
        let module = ModulePath::parse(module)?;
        let _guard = self.lock();
        Ok(self.namespace.list_direct_keys_in_module(&module))
    }

    /// Every module remembered by any replica, sorted and deduplicated.
    pub fn get_all_modules(&self) -> Vec<String> {
        let _guard = self.lock();
        self.namespace.list_all_modules()
    }

    /// Modules whose path contains `prefix` as a substring (see
    /// [`Namespace::list_submodules`](crate::namespace::Namespace::list_submodules)
    /// for the matching caveat).
    pub fn get_all_submodules(&self, prefix: &str) -> Vec<String> {
        let _guard = self.lock();
        self.namespace.list_submodules(prefix)
    }

    /// Whether any record anywhere carries this data key.
    pub fn contains(&self, data_key: &str) -> bool {
        let _guard = self.lock();
        self.namespace.contains(data_key)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
