//! Typed, validated configuration slots owned by components.
//!
//! A parameter is declared from a [`ParameterDef`] in the owning component's
//! constructor and lives in that component's [`ParameterRegistry`]:
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │ ComponentCore                               │
//! │  └── ParameterRegistry (declaration order)  │
//! │       ├── Parameter<String>   "devname"     │
//! │       ├── Parameter<u32>      "baudrate"    │
//! │       └── Parameter<LineStyle> "linestyle"  │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! Typed access goes through [`Parameter<T>`]; descriptor-based access from
//! elsewhere in the tree goes through the type-erased [`ParameterBase`] and
//! is downcast back to `Parameter<T>`, failing with a type mismatch when the
//! requested `T` differs from the declared one.

pub mod registry;
pub mod snapshot;
pub mod types;
pub mod value;

use std::any::Any;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::{Mutex, RwLock};
use tracing::debug;

pub use registry::ParameterRegistry;
pub use types::{ParameterDef, ParameterSummary, ValidValues, ValueRange};
pub use value::{ParamValue, from_string, to_string};

use crate::util::demangled_name;
use crate::{Error, Result};

/// Change callback, invoked with the candidate value before it is stored.
/// Returning an error rejects the change.
pub type Callback<T> = Arc<dyn Fn(&T) -> Result<()> + Send + Sync>;

/// A typed parameter.
pub struct Parameter<T: ParamValue> {
    name: String,
    description: String,
    category: String,
    default: T,
    valid: ValidValues<T>,
    value: RwLock<T>,
    frozen: AtomicBool,
    callback: RwLock<Option<Callback<T>>>,
    // Serializes setters through validation, callback and commit
    set_lock: Mutex<()>,
}

impl<T: ParamValue> Parameter<T> {
    /// Build a parameter from its declaration. The default must satisfy the
    /// declared constraint.
    pub fn new(mut def: ParameterDef<T>) -> Result<Self> {
        let valid = def.compile_valid()?;
        valid
            .check(&def.default)
            .map_err(|reason| Error::validation(&def.name, format!("bad default: {reason}")))?;

        Ok(Self {
            value: RwLock::new(def.default.clone()),
            name: def.name,
            description: def.description,
            category: def.category,
            default: def.default,
            valid,
            frozen: AtomicBool::new(false),
            callback: RwLock::new(None),
            set_lock: Mutex::new(()),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn category(&self) -> &str {
        &self.category
    }

    pub fn default_value(&self) -> &T {
        &self.default
    }

    pub fn valid_values(&self) -> &ValidValues<T> {
        &self.valid
    }

    /// Current value.
    pub fn get(&self) -> T {
        self.value.read().clone()
    }

    /// Validate and store a new value.
    ///
    /// Checks run in order: frozen flag, valid values, change callback. On
    /// any failure the stored value is left untouched.
    pub fn set(&self, value: T) -> Result<()> {
        let _guard = self.set_lock.lock();

        if self.frozen.load(Ordering::Acquire) {
            return Err(Error::validation(&self.name, "parameter is frozen"));
        }

        self.valid
            .check(&value)
            .map_err(|reason| Error::validation(&self.name, reason))?;

        let callback = self.callback.read().clone();
        if let Some(callback) = callback {
            callback(&value).map_err(|e| e.with_param(&self.name))?;
        }

        debug!(param = %self.name, value = %value.to_param_string(), "Parameter set");
        *self.value.write() = value;
        Ok(())
    }

    /// Parse and store a value from its string form.
    pub fn strset(&self, s: &str) -> Result<()> {
        let value = T::from_param_string(s).map_err(|e| e.with_param(&self.name))?;
        self.set(value)
    }

    pub fn strget(&self) -> String {
        self.value.read().to_param_string()
    }

    /// Restore the declared default, going through the usual checks.
    pub fn reset(&self) -> Result<()> {
        self.set(self.default.clone())
    }

    /// Install the change callback, replacing any previous one.
    pub fn set_callback<F>(&self, callback: F)
    where
        F: Fn(&T) -> Result<()> + Send + Sync + 'static,
    {
        *self.callback.write() = Some(Arc::new(callback));
    }

    pub fn clear_callback(&self) {
        *self.callback.write() = None;
    }

    pub fn freeze(&self) {
        self.frozen.store(true, Ordering::Release);
    }

    pub fn unfreeze(&self) {
        self.frozen.store(false, Ordering::Release);
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen.load(Ordering::Acquire)
    }
}

impl<T: ParamValue> std::fmt::Debug for Parameter<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Parameter")
            .field("name", &self.name)
            .field("value", &*self.value.read())
            .field("valid", &self.valid)
            .finish()
    }
}

/// Type-erased view of a parameter, used by descriptor walks.
pub trait ParameterBase: Any + Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    fn category(&self) -> &str;
    fn type_name(&self) -> &'static str;
    fn strget(&self) -> String;
    fn strset(&self, s: &str) -> Result<()>;
    fn default_string(&self) -> String;
    fn valid_values_string(&self) -> String;
    fn reset(&self) -> Result<()>;
    fn freeze(&self);
    fn unfreeze(&self);
    fn is_frozen(&self) -> bool;
    fn as_any(&self) -> &dyn Any;
    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
}

impl<T: ParamValue> ParameterBase for Parameter<T> {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn category(&self) -> &str {
        &self.category
    }

    fn type_name(&self) -> &'static str {
        demangled_name::<T>()
    }

    fn strget(&self) -> String {
        Parameter::strget(self)
    }

    fn strset(&self, s: &str) -> Result<()> {
        Parameter::strset(self, s)
    }

    fn default_string(&self) -> String {
        self.default.to_param_string()
    }

    fn valid_values_string(&self) -> String {
        self.valid.describe()
    }

    fn reset(&self) -> Result<()> {
        Parameter::reset(self)
    }

    fn freeze(&self) {
        Parameter::freeze(self)
    }

    fn unfreeze(&self) {
        Parameter::unfreeze(self)
    }

    fn is_frozen(&self) -> bool {
        Parameter::is_frozen(self)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

impl dyn ParameterBase {
    /// Downcast to the typed parameter, `None` if `T` is not the declared type.
    pub fn downcast_ref<T: ParamValue>(&self) -> Option<&Parameter<T>> {
        self.as_any().downcast_ref::<Parameter<T>>()
    }
}
