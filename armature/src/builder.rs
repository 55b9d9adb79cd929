//! Builder for configured component trees.
//!
//! Parameter values are applied right after the root is constructed, before
//! `init()`, in this order (later sources win):
//!
//! 1. the snapshot file given with [`RootBuilder::with_snapshot_file`], or
//!    else the file named by `ARMATURE_PARAMS_FILE`
//! 2. overrides given with [`RootBuilder::with_param`] /
//!    [`RootBuilder::with_override`]
//! 3. overrides from `ARMATURE_PARAMS`, formatted as `desc=value;desc=value`
//!
//! ```shell
//! export ARMATURE_PARAMS='serial:devname=/dev/ttyUSB0;serial:baudrate=9600'
//! ```

use std::marker::PhantomData;
use std::path::PathBuf;

use tracing::debug;

use crate::component::{Component, ComponentCore, ComponentExt, Root};
use crate::parameter::ParamValue;
use crate::parameter::snapshot::Snapshot;
use crate::Result;

pub const PARAMS_ENV: &str = "ARMATURE_PARAMS";
pub const PARAMS_FILE_ENV: &str = "ARMATURE_PARAMS_FILE";

/// Consuming builder, shared by every configurable object of the crate.
pub trait Builder {
    /// The type produced by this builder.
    type Output;

    /// Consume the builder and construct the configured object.
    ///
    /// # Errors
    ///
    /// Returns an error if construction fails, if a configuration source
    /// cannot be read or holds a rejected value, or if initialization fails.
    fn build(self) -> Result<Self::Output>;
}

/// Builds a [`Root`] and applies parameter values to its tree.
///
/// ```
/// use armature::prelude::*;
///
/// struct App {
///     core: ComponentCore,
/// }
///
/// impl Component for App {
///     fn core(&self) -> &ComponentCore {
///         &self.core
///     }
/// }
///
/// let app = RootBuilder::new("app", |core: ComponentCore| -> armature::Result<App> {
///     core.declare(ParameterDef::new("verbose", "Chatty output", false, "General"))?;
///     Ok(App { core })
/// })
/// .with_param("verbose", true)
/// .without_env()
/// .build()
/// .unwrap();
///
/// assert!(app.get_param_val_unique::<bool>("verbose").unwrap());
/// ```
pub struct RootBuilder<C, F> {
    instance: String,
    build: F,
    path: Option<String>,
    snapshot_file: Option<PathBuf>,
    overrides: Snapshot,
    env_vars: Option<(String, String)>,
    init: bool,
    _component: PhantomData<fn() -> C>,
}

impl<C, F> RootBuilder<C, F>
where
    C: Component,
    F: FnOnce(ComponentCore) -> Result<C>,
{
    pub fn new(instance: impl Into<String>, build: F) -> Self {
        Self {
            instance: instance.into(),
            build,
            path: None,
            snapshot_file: None,
            overrides: Snapshot::new(),
            env_vars: Some((PARAMS_ENV.to_string(), PARAMS_FILE_ENV.to_string())),
            init: false,
            _component: PhantomData,
        }
    }

    /// Base path inherited by the children added to the root.
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Load a YAML snapshot. Takes precedence over `ARMATURE_PARAMS_FILE`.
    pub fn with_snapshot_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.snapshot_file = Some(path.into());
        self
    }

    /// Typed override for every parameter matching `descriptor`.
    pub fn with_param<T: ParamValue>(mut self, descriptor: impl Into<String>, value: T) -> Self {
        self.overrides.insert(descriptor, value.to_param_string());
        self
    }

    /// String override for every parameter matching `descriptor`.
    pub fn with_override(mut self, descriptor: impl Into<String>, value: impl Into<String>) -> Self {
        self.overrides.insert(descriptor, value);
        self
    }

    /// Read overrides from other environment variables than
    /// `ARMATURE_PARAMS` and `ARMATURE_PARAMS_FILE`.
    pub fn with_env_vars(mut self, params: impl Into<String>, params_file: impl Into<String>) -> Self {
        self.env_vars = Some((params.into(), params_file.into()));
        self
    }

    /// Ignore the environment entirely.
    pub fn without_env(mut self) -> Self {
        self.env_vars = None;
        self
    }

    /// Initialize the tree once all values are applied.
    pub fn with_init(mut self) -> Self {
        self.init = true;
        self
    }

    fn collect_values(&self) -> Result<Snapshot> {
        let env = |name: &str| std::env::var(name).ok().filter(|v| !v.is_empty());

        let file = self.snapshot_file.clone().or_else(|| {
            self.env_vars
                .as_ref()
                .and_then(|(_, file_var)| env(file_var))
                .map(PathBuf::from)
        });

        let mut values = match file {
            Some(file) => {
                debug!(file = %file.display(), "Loading parameter snapshot");
                Snapshot::load(file)?
            }
            None => Snapshot::new(),
        };

        values.merge(self.overrides.clone());

        if let Some((params_var, _)) = &self.env_vars {
            if let Some(overrides) = env(params_var) {
                debug!(var = %params_var, %overrides, "Applying parameter overrides from environment");
                values.merge(Snapshot::parse_overrides(&overrides)?);
            }
        }
        Ok(values)
    }
}

impl<C, F> Builder for RootBuilder<C, F>
where
    C: Component,
    F: FnOnce(ComponentCore) -> Result<C>,
{
    type Output = Root<C>;

    #[tracing::instrument(name = "root_build", skip(self), fields(
        instance = %self.instance,
        snapshot_file = ?self.snapshot_file,
        init = self.init
    ))]
    fn build(self) -> Result<Root<C>> {
        let values = self.collect_values()?;

        let root = Root::new(&self.instance, self.build)?;
        if let Some(path) = self.path {
            root.core().set_path(path);
        }

        debug!(count = values.len(), "Applying parameter values");
        root.restore(&values)?;

        if self.init {
            root.init()?;
        }
        Ok(root)
    }
}
