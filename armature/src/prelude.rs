//! Convenience re-exports for common armature types.
//!
//! Import everything with `use armature::prelude::*;` to get the types and
//! traits needed to declare components and work with their parameters.

/// The builder trait, required to call `.build()` on any builder type.
pub use crate::Builder;

/// Builder for configured component trees.
pub use crate::builder::RootBuilder;

/// Component trait, its shared state, tree operations and the owning root.
pub use crate::component::{Component, ComponentCore, ComponentExt, Root};

/// Parameter declaration and typed access.
pub use crate::parameter::{ParamValue, Parameter, ParameterBase, ParameterDef, ParameterSummary};

/// Command channels.
pub use crate::user_interface::{InterfaceType, UserInterface};

pub use crate::{Error, Result};
