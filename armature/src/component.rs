//! Hierarchical components owning typed parameters.
//!
//! A [`Component`] embeds a [`ComponentCore`] which carries its instance
//! name, its parameters and its sub-components. Concrete components only
//! provide `core()` and, optionally, lifecycle hooks; every tree operation
//! lives in [`ComponentExt`], implemented for all components:
//!
//! ```text
//! Root<App>                 "app"
//!  ├── Camera               "cam"      params: fps, gain
//!  │    └── Serial          "serial"   params: devname, baudrate, ...
//!  └── Logger               "log"      params: log
//! ```
//!
//! Children are attached with [`ComponentExt::add_sub_component`], which
//! hands the new component a fresh core and initializes it right away when
//! the parent is already running. The tree is owned through [`Root`], whose
//! drop uninitializes everything bottom-up.
//!
//! ```
//! use std::sync::Arc;
//!
//! use armature::prelude::*;
//!
//! struct Camera {
//!     core: ComponentCore,
//!     fps: Arc<Parameter<u32>>,
//! }
//!
//! impl Camera {
//!     fn new(core: ComponentCore) -> armature::Result<Self> {
//!         let fps = core.declare(ParameterDef::new("fps", "Frames/s", 30u32, "Camera"))?;
//!         Ok(Self { core, fps })
//!     }
//! }
//!
//! impl Component for Camera {
//!     fn core(&self) -> &ComponentCore {
//!         &self.core
//!     }
//! }
//!
//! struct App {
//!     core: ComponentCore,
//! }
//!
//! impl Component for App {
//!     fn core(&self) -> &ComponentCore {
//!         &self.core
//!     }
//! }
//!
//! let app = Root::new("app", |core| Ok(App { core })).unwrap();
//! let cam = app.add_sub_component("cam", Camera::new).unwrap();
//!
//! assert_eq!(app.set_param_val("*:fps", 60u32).unwrap(), vec!["cam:fps"]);
//! assert_eq!(cam.fps.get(), 60);
//! ```

use std::any::Any;
use std::cell::Cell;
use std::ops::Deref;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock, Weak};

use parking_lot::{ReentrantMutex, RwLock, RwLockUpgradableReadGuard};
use tracing::{debug, error, info, warn};

use crate::descriptor::{Descriptor, is_valid_name};
use crate::parameter::snapshot::Snapshot;
use crate::parameter::{
    ParamValue, Parameter, ParameterBase, ParameterDef, ParameterRegistry, ParameterSummary,
};
use crate::util::{demangled_name, short_type_name};
use crate::{Error, Result};

/// Type-erasure helper, implemented for every `'static` type so that
/// components can be downcast from `Arc<dyn Component>`.
pub trait AsAny: Any + Send + Sync {
    fn as_any(&self) -> &dyn Any;
    fn into_any_arc(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
}

impl<T: Any + Send + Sync> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn into_any_arc(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

/// A node of the component tree.
///
/// Hooks default to no-ops. `pre_init` runs before the children are
/// initialized and `post_init` after; `pre_uninit` runs before the children
/// are torn down and `post_uninit` after.
pub trait Component: AsAny {
    fn core(&self) -> &ComponentCore;

    fn pre_init(&self) -> Result<()> {
        Ok(())
    }

    fn post_init(&self) -> Result<()> {
        Ok(())
    }

    fn pre_uninit(&self) -> Result<()> {
        Ok(())
    }

    fn post_uninit(&self) -> Result<()> {
        Ok(())
    }
}

/// State shared by every component: identity, parameters, children.
pub struct ComponentCore {
    instance_name: String,
    class_name: &'static str,
    this: OnceLock<Weak<dyn Component>>,
    parent: RwLock<Option<Weak<dyn Component>>>,
    subs: RwLock<Vec<Arc<dyn Component>>>,
    params: ParameterRegistry,
    initialized: AtomicBool,
    // Held across init, uninit and attach. Reentrant: hooks may add
    // children to their own component.
    lifecycle: ReentrantMutex<()>,
    path: RwLock<String>,
}

impl ComponentCore {
    pub fn new(instance_name: impl Into<String>, class_name: &'static str) -> Self {
        Self {
            instance_name: instance_name.into(),
            class_name,
            this: OnceLock::new(),
            parent: RwLock::new(None),
            subs: RwLock::new(Vec::new()),
            params: ParameterRegistry::new(),
            initialized: AtomicBool::new(false),
            lifecycle: ReentrantMutex::new(()),
            path: RwLock::new(String::new()),
        }
    }

    pub fn instance_name(&self) -> &str {
        &self.instance_name
    }

    /// Full type name of the concrete component.
    pub fn class_name(&self) -> &'static str {
        self.class_name
    }

    pub fn params(&self) -> &ParameterRegistry {
        &self.params
    }

    /// Declare a parameter owned by this component.
    pub fn declare<T: ParamValue>(&self, def: ParameterDef<T>) -> Result<Arc<Parameter<T>>> {
        self.params.declare(&self.instance_name, def)
    }

    pub fn parent(&self) -> Option<Arc<dyn Component>> {
        self.parent.read().as_ref().and_then(Weak::upgrade)
    }

    /// Snapshot of the children, in insertion order.
    pub fn sub_components(&self) -> Vec<Arc<dyn Component>> {
        self.subs.read().clone()
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::Acquire)
    }

    /// Base path for relative file names, inherited from the parent on attach.
    pub fn path(&self) -> String {
        self.path.read().clone()
    }

    pub fn set_path(&self, path: impl Into<String>) {
        *self.path.write() = path.into();
    }

    fn bind<C: Component>(&self, this: &Arc<C>) {
        let this: Arc<dyn Component> = this.clone();
        let weak = Arc::downgrade(&this);
        // Children added from the constructor had no parent handle yet
        for sub in self.subs.read().iter() {
            *sub.core().parent.write() = Some(weak.clone());
        }
        // Only the framework binds, once, right after allocation
        let _ = self.this.set(weak);
    }
}

impl std::fmt::Debug for ComponentCore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComponentCore")
            .field("instance_name", &self.instance_name)
            .field("class_name", &self.class_name)
            .field("params", &self.params.names())
            .field("initialized", &self.is_initialized())
            .finish()
    }
}

fn same_component<A: ?Sized, B: ?Sized>(a: &Arc<A>, b: &Arc<B>) -> bool {
    Arc::as_ptr(a) as *const () == Arc::as_ptr(b) as *const ()
}

/// Pick a unique instance name among `siblings`.
///
/// An empty request becomes the short class name followed by `#`. Each `#`
/// is first dropped; if the result is taken, every `#` is replaced by the
/// smallest integer >= 1 that makes the name unique. A name without `#`
/// that is already taken is a clash.
fn unique_instance_name(
    siblings: &[Arc<dyn Component>],
    requested: &str,
    class_name: &str,
    parent: &str,
) -> Result<String> {
    let pattern = if requested.is_empty() {
        format!("{}#", short_type_name(class_name))
    } else {
        requested.to_string()
    };

    let taken = |name: &str| siblings.iter().any(|c| c.core().instance_name() == name);

    let plain = pattern.replace('#', "");
    if !is_valid_name(&plain) {
        return Err(Error::invalid_descriptor(plain, "invalid instance name"));
    }
    if !taken(&plain) {
        return Ok(plain);
    }

    let clash = || Error::NameClash {
        parent: parent.to_string(),
        name: plain.clone(),
    };
    if !pattern.contains('#') {
        return Err(clash());
    }

    (1..=siblings.len() + 1)
        .map(|i| pattern.replace('#', &i.to_string()))
        .find(|name| !taken(name))
        .ok_or_else(clash)
}

fn new_component<C, F>(name: String, build: F) -> Result<Arc<C>>
where
    C: Component,
    F: FnOnce(ComponentCore) -> Result<C>,
{
    let component = Arc::new(build(ComponentCore::new(name, demangled_name::<C>()))?);
    component.core().bind(&component);
    Ok(component)
}

type Matches = Vec<(String, Arc<dyn ParameterBase>)>;

fn downcast_param<T: ParamValue>(
    path: String,
    param: Arc<dyn ParameterBase>,
) -> Result<(String, Arc<Parameter<T>>)> {
    match param.into_any().downcast::<Parameter<T>>() {
        Ok(param) => Ok((path, param)),
        Err(_) => Err(Error::TypeMismatch {
            descriptor: path,
            requested: std::any::type_name::<T>(),
        }),
    }
}

// All matches are type-checked before any of them is touched
fn downcast_all<T: ParamValue>(matches: Matches) -> Result<Vec<(String, Arc<Parameter<T>>)>> {
    matches
        .into_iter()
        .map(|(path, param)| downcast_param(path, param))
        .collect()
}

/// Set every matched parameter in order. On failure, the ones already
/// changed are put back to their previous value.
fn apply_all<P, V>(
    matches: &[(String, P)],
    mut set: impl FnMut(&P) -> Result<V>,
    mut undo: impl FnMut(&P, V) -> Result<()>,
) -> Result<Vec<String>> {
    let mut changed = Vec::with_capacity(matches.len());
    for (path, param) in matches {
        match set(param) {
            Ok(old) => changed.push((path, param, old)),
            Err(e) => {
                for (path, param, old) in changed.into_iter().rev() {
                    if let Err(undo_err) = undo(param, old) {
                        warn!(param = %path, error = %undo_err, "Failed to restore parameter");
                    }
                }
                return Err(e);
            }
        }
    }
    Ok(matches.iter().map(|(path, _)| path.clone()).collect())
}

fn for_each_param_deep<C, F>(comp: &C, prefix: &str, f: &mut F)
where
    C: Component + ?Sized,
    F: FnMut(&str, &Arc<dyn ParameterBase>),
{
    let core = comp.core();
    for param in core.params().all() {
        f(&format!("{prefix}{}", param.name()), &param);
    }
    for sub in core.sub_components() {
        for_each_param_deep(&*sub, &format!("{prefix}{}:", sub.core().instance_name()), f);
    }
}

/// Tree, lifecycle and parameter operations available on every component.
pub trait ComponentExt: Component {
    /// Construct and attach a child.
    ///
    /// `build` receives the child's core and must store it. If this
    /// component is initialized the child is initialized before returning;
    /// should that fail, the child is detached again.
    fn add_sub_component<C, F>(&self, instance: &str, build: F) -> Result<Arc<C>>
    where
        C: Component,
        F: FnOnce(ComponentCore) -> Result<C>;

    /// Detach a child and uninitialize it.
    fn remove_sub_component<C: Component + ?Sized>(&self, handle: &Arc<C>) -> Result<()>;

    fn remove_sub_component_by_name(&self, instance: &str) -> Result<()>;

    /// Look up a child by instance name and downcast it.
    fn get_sub_component<C: Component>(&self, instance: &str) -> Result<Arc<C>>;

    fn sub_component(&self, instance: &str) -> Result<Arc<dyn Component>>;

    fn sub_components(&self) -> Vec<Arc<dyn Component>>;

    /// Name a new child of class `class_name` would get for `requested`.
    fn compute_instance_name(&self, requested: &str, class_name: &str) -> Result<String>;

    /// Initialize this component and its subtree.
    fn init(&self) -> Result<()>;

    /// Uninitialize this component and its subtree. Hook errors are logged.
    fn uninit(&self);

    fn is_initialized(&self) -> bool;

    /// Walk the parameters matching `descriptor`, calling `act` with each
    /// parameter and its resolved descriptor. The walk stops as soon as
    /// `done` returns true.
    fn visit_params<A, D>(&self, descriptor: &str, act: A, done: D) -> Result<()>
    where
        A: FnMut(&Arc<dyn ParameterBase>, &str) -> Result<()>,
        D: FnMut() -> bool;

    /// All parameters matching `descriptor`, in walk order.
    fn find_params(&self, descriptor: &str) -> Result<Vec<(String, Arc<dyn ParameterBase>)>>;

    /// The single parameter matching `descriptor`.
    fn find_param_unique(&self, descriptor: &str) -> Result<(String, Arc<dyn ParameterBase>)>;

    /// Set every matching parameter. Returns the resolved descriptors,
    /// empty when nothing matched.
    fn set_param_val<T: ParamValue>(&self, descriptor: &str, value: T) -> Result<Vec<String>>;

    fn set_param_val_unique<T: ParamValue>(&self, descriptor: &str, value: T) -> Result<()>;

    fn get_param_val<T: ParamValue>(&self, descriptor: &str) -> Result<Vec<(String, T)>>;

    fn get_param_val_unique<T: ParamValue>(&self, descriptor: &str) -> Result<T>;

    fn set_param_string(&self, descriptor: &str, value: &str) -> Result<Vec<String>>;

    fn set_param_string_unique(&self, descriptor: &str, value: &str) -> Result<()>;

    fn get_param_string(&self, descriptor: &str) -> Result<Vec<(String, String)>>;

    fn get_param_string_unique(&self, descriptor: &str) -> Result<String>;

    fn freeze_param(&self, descriptor: &str) -> Result<Vec<String>>;

    fn unfreeze_param(&self, descriptor: &str) -> Result<Vec<String>>;

    /// Description of every parameter in the subtree.
    fn param_summaries(&self) -> Vec<ParameterSummary>;

    /// Current value of every parameter in the subtree, keyed by descriptor.
    fn snapshot(&self) -> Snapshot;

    /// Apply a snapshot entry by entry, stopping at the first failure.
    fn restore(&self, snapshot: &Snapshot) -> Result<()>;

    fn save_snapshot(&self, path: impl AsRef<Path>) -> Result<()>;

    fn load_snapshot(&self, path: impl AsRef<Path>) -> Result<()>;

    /// Colon-joined instance names from the root down to this component,
    /// root excluded.
    fn descriptor(&self) -> String;

    /// Resolve `rel` against this component's path. Absolute paths are
    /// returned unchanged.
    fn absolute_path(&self, rel: impl AsRef<Path>) -> PathBuf;
}

impl<S: Component + ?Sized> ComponentExt for S {
    fn add_sub_component<C, F>(&self, instance: &str, build: F) -> Result<Arc<C>>
    where
        C: Component,
        F: FnOnce(ComponentCore) -> Result<C>,
    {
        let core = self.core();
        let _lifecycle = core.lifecycle.lock();
        let child = {
            let mut subs = core.subs.write();
            let name =
                unique_instance_name(&subs, instance, demangled_name::<C>(), core.instance_name())?;
            let child = new_component(name, build)?;
            *child.core().parent.write() = core.this.get().cloned();
            child.core().set_path(core.path());
            subs.push(child.clone());
            child
        };
        debug!(
            parent = %core.instance_name(),
            child = %child.core().instance_name(),
            class = %child.core().class_name(),
            "Added sub-component"
        );

        if core.is_initialized() {
            if let Err(e) = child.init() {
                core.subs.write().retain(|c| !same_component(c, &child));
                *child.core().parent.write() = None;
                return Err(e);
            }
        }
        Ok(child)
    }

    fn remove_sub_component<C: Component + ?Sized>(&self, handle: &Arc<C>) -> Result<()> {
        let core = self.core();
        let subs = core.subs.upgradable_read();
        let Some(index) = subs.iter().position(|c| same_component(c, handle)) else {
            warn!(
                parent = %core.instance_name(),
                child = %handle.core().instance_name(),
                "Sub-component not found, not removed"
            );
            return Err(Error::NotFound(format!(
                "Sub-component [{}] of [{}]",
                handle.core().instance_name(),
                core.instance_name()
            )));
        };
        let child = RwLockUpgradableReadGuard::upgrade(subs).remove(index);

        child.uninit();
        *child.core().parent.write() = None;
        debug!(parent = %core.instance_name(), child = %child.core().instance_name(), "Removed sub-component");
        Ok(())
    }

    fn remove_sub_component_by_name(&self, instance: &str) -> Result<()> {
        let child = self.sub_component(instance).inspect_err(|_| {
            warn!(parent = %self.core().instance_name(), child = instance, "Sub-component not found, not removed");
        })?;
        self.remove_sub_component(&child)
    }

    fn get_sub_component<C: Component>(&self, instance: &str) -> Result<Arc<C>> {
        self.sub_component(instance)?
            .into_any_arc()
            .downcast::<C>()
            .map_err(|_| Error::TypeMismatch {
                descriptor: instance.to_string(),
                requested: demangled_name::<C>(),
            })
    }

    fn sub_component(&self, instance: &str) -> Result<Arc<dyn Component>> {
        let core = self.core();
        core.subs
            .read()
            .iter()
            .find(|c| c.core().instance_name() == instance)
            .cloned()
            .ok_or_else(|| {
                Error::NotFound(format!(
                    "Sub-component [{instance}] of [{}]",
                    core.instance_name()
                ))
            })
    }

    fn sub_components(&self) -> Vec<Arc<dyn Component>> {
        self.core().sub_components()
    }

    fn compute_instance_name(&self, requested: &str, class_name: &str) -> Result<String> {
        let core = self.core();
        unique_instance_name(&core.subs.read(), requested, class_name, core.instance_name())
    }

    #[tracing::instrument(name = "init", skip(self), fields(component = %self.core().instance_name()))]
    fn init(&self) -> Result<()> {
        let core = self.core();
        let _lifecycle = core.lifecycle.lock();
        if core.is_initialized() {
            warn!("Already initialized, ignored");
            return Ok(());
        }

        self.pre_init()?;

        let subs = core.sub_components();
        for (i, sub) in subs.iter().enumerate() {
            if let Err(e) = sub.init() {
                error!(child = %sub.core().instance_name(), error = %e, "Sub-component failed to initialize");
                subs[..i].iter().rev().for_each(|started| started.uninit());
                return Err(e);
            }
        }

        if let Err(e) = self.post_init() {
            subs.iter().rev().for_each(|started| started.uninit());
            return Err(e);
        }

        core.initialized.store(true, Ordering::Release);
        info!("Initialized");
        Ok(())
    }

    #[tracing::instrument(name = "uninit", skip(self), fields(component = %self.core().instance_name()))]
    fn uninit(&self) {
        let core = self.core();
        let _lifecycle = core.lifecycle.lock();
        if !core.is_initialized() {
            debug!("Not initialized, ignored");
            return;
        }

        if let Err(e) = self.pre_uninit() {
            error!(error = %e, "pre_uninit failed");
        }
        for sub in core.sub_components().iter().rev() {
            sub.uninit();
        }
        if let Err(e) = self.post_uninit() {
            error!(error = %e, "post_uninit failed");
        }

        core.initialized.store(false, Ordering::Release);
        info!("Uninitialized");
    }

    fn is_initialized(&self) -> bool {
        self.core().is_initialized()
    }

    fn visit_params<A, D>(&self, descriptor: &str, mut act: A, mut done: D) -> Result<()>
    where
        A: FnMut(&Arc<dyn ParameterBase>, &str) -> Result<()>,
        D: FnMut() -> bool,
    {
        let parsed = Descriptor::parse(descriptor)?;
        crate::descriptor::visit(self, parsed.segments(), "", &mut act, &mut done)?;
        Ok(())
    }

    fn find_params(&self, descriptor: &str) -> Result<Vec<(String, Arc<dyn ParameterBase>)>> {
        let mut found = Vec::new();
        self.visit_params(
            descriptor,
            |param, path| {
                found.push((path.to_string(), param.clone()));
                Ok(())
            },
            || false,
        )?;
        Ok(found)
    }

    fn find_param_unique(&self, descriptor: &str) -> Result<(String, Arc<dyn ParameterBase>)> {
        let mut found = Vec::new();
        let count = Cell::new(0usize);
        // A second match is enough to know the descriptor is ambiguous
        self.visit_params(
            descriptor,
            |param, path| {
                found.push((path.to_string(), param.clone()));
                count.set(count.get() + 1);
                Ok(())
            },
            || count.get() > 1,
        )?;
        match found.len() {
            0 => Err(Error::NotFound(format!("Parameter [{descriptor}]"))),
            1 => Ok(found.remove(0)),
            _ => Err(Error::MultipleMatch(descriptor.to_string())),
        }
    }

    fn set_param_val<T: ParamValue>(&self, descriptor: &str, value: T) -> Result<Vec<String>> {
        let matches = downcast_all::<T>(self.find_params(descriptor)?)?;
        apply_all(
            &matches,
            |param| {
                let old = param.get();
                param.set(value.clone()).map(|_| old)
            },
            |param, old| param.set(old),
        )
    }

    fn set_param_val_unique<T: ParamValue>(&self, descriptor: &str, value: T) -> Result<()> {
        let (path, param) = self.find_param_unique(descriptor)?;
        let (_, param) = downcast_param::<T>(path, param)?;
        param.set(value)
    }

    fn get_param_val<T: ParamValue>(&self, descriptor: &str) -> Result<Vec<(String, T)>> {
        Ok(downcast_all::<T>(self.find_params(descriptor)?)?
            .into_iter()
            .map(|(path, param)| (path, param.get()))
            .collect())
    }

    fn get_param_val_unique<T: ParamValue>(&self, descriptor: &str) -> Result<T> {
        let (path, param) = self.find_param_unique(descriptor)?;
        Ok(downcast_param::<T>(path, param)?.1.get())
    }

    fn set_param_string(&self, descriptor: &str, value: &str) -> Result<Vec<String>> {
        let matches = self.find_params(descriptor)?;
        apply_all(
            &matches,
            |param| {
                let old = param.strget();
                param.strset(value).map(|_| old)
            },
            |param, old| param.strset(&old),
        )
    }

    fn set_param_string_unique(&self, descriptor: &str, value: &str) -> Result<()> {
        self.find_param_unique(descriptor)?.1.strset(value)
    }

    fn get_param_string(&self, descriptor: &str) -> Result<Vec<(String, String)>> {
        Ok(self
            .find_params(descriptor)?
            .into_iter()
            .map(|(path, param)| (path, param.strget()))
            .collect())
    }

    fn get_param_string_unique(&self, descriptor: &str) -> Result<String> {
        Ok(self.find_param_unique(descriptor)?.1.strget())
    }

    fn freeze_param(&self, descriptor: &str) -> Result<Vec<String>> {
        let matches = self.find_params(descriptor)?;
        matches.iter().for_each(|(_, param)| param.freeze());
        Ok(matches.into_iter().map(|(path, _)| path).collect())
    }

    fn unfreeze_param(&self, descriptor: &str) -> Result<Vec<String>> {
        let matches = self.find_params(descriptor)?;
        matches.iter().for_each(|(_, param)| param.unfreeze());
        Ok(matches.into_iter().map(|(path, _)| path).collect())
    }

    fn param_summaries(&self) -> Vec<ParameterSummary> {
        let mut summaries = Vec::new();
        for_each_param_deep(self, "", &mut |path: &str, param: &Arc<dyn ParameterBase>| {
            summaries.push(ParameterSummary {
                descriptor: path.to_string(),
                name: param.name().to_string(),
                description: param.description().to_string(),
                value_type: param.type_name().to_string(),
                default_value: param.default_string(),
                value: param.strget(),
                valid_values: param.valid_values_string(),
                category: param.category().to_string(),
                frozen: param.is_frozen(),
            });
        });
        summaries
    }

    fn snapshot(&self) -> Snapshot {
        let mut snapshot = Snapshot::new();
        for_each_param_deep(self, "", &mut |path: &str, param: &Arc<dyn ParameterBase>| {
            snapshot.insert(path, param.strget());
        });
        snapshot
    }

    fn restore(&self, snapshot: &Snapshot) -> Result<()> {
        for (descriptor, value) in snapshot.iter() {
            let set = self.set_param_string(descriptor, value)?;
            if set.is_empty() {
                warn!(descriptor, "No parameter matches snapshot entry, skipped");
            }
        }
        Ok(())
    }

    fn save_snapshot(&self, path: impl AsRef<Path>) -> Result<()> {
        self.snapshot().save(path)
    }

    fn load_snapshot(&self, path: impl AsRef<Path>) -> Result<()> {
        self.restore(&Snapshot::load(path)?)
    }

    fn descriptor(&self) -> String {
        let core = self.core();
        let mut names = Vec::new();
        let mut name = core.instance_name().to_string();
        let mut parent = core.parent();
        while let Some(p) = parent {
            names.push(name);
            name = p.core().instance_name().to_string();
            parent = p.core().parent();
        }
        names.reverse();
        names.join(":")
    }

    fn absolute_path(&self, rel: impl AsRef<Path>) -> PathBuf {
        let rel = rel.as_ref();
        let base = self.core().path();
        if rel.is_absolute() || base.is_empty() {
            rel.to_path_buf()
        } else {
            Path::new(&base).join(rel)
        }
    }
}

/// Owner of a component tree.
///
/// Dropping the root uninitializes the whole tree if it is still
/// initialized; children are torn down before the root's `post_uninit`.
pub struct Root<C: Component> {
    component: Arc<C>,
}

impl<C: Component> Root<C> {
    /// Build the root component. An empty `instance` defaults to the short
    /// class name.
    pub fn new<F>(instance: &str, build: F) -> Result<Self>
    where
        F: FnOnce(ComponentCore) -> Result<C>,
    {
        let name = unique_instance_name(&[], instance, demangled_name::<C>(), "")?;
        Ok(Self {
            component: new_component(name, build)?,
        })
    }

    /// Shared handle to the root component. The tree is still uninitialized
    /// when the `Root` itself is dropped.
    pub fn handle(&self) -> Arc<C> {
        self.component.clone()
    }
}

impl<C: Component> Deref for Root<C> {
    type Target = C;

    fn deref(&self) -> &C {
        &self.component
    }
}

impl<C: Component> Drop for Root<C> {
    fn drop(&mut self) {
        if self.component.core().is_initialized() {
            self.component.uninit();
        }
    }
}
