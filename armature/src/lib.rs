//! # armature: component trees with typed, addressable parameters
//!
//! `armature` organizes an application as a tree of named components. Each
//! component owns typed parameters, declared where the component is
//! constructed and validated on every change. Parameters anywhere below a
//! component are reached with colon-separated descriptors such as
//! `cam:serial:baudrate` or `*:fps`.
//!
//! ## Getting started
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
//! impl Component for Camera {
//!     fn core(&self) -> &ComponentCore {
//!         &self.core
//!     }
//! }
//!
//! fn camera(core: ComponentCore) -> armature::Result<Camera> {
//!     let fps = core.declare(
//!         ParameterDef::new("fps", "Frames per second", 30u32, "Camera").with_range(1, 120),
//!     )?;
//!     Ok(Camera { core, fps })
//! }
//!
//! let root = RootBuilder::new("cam", camera)
//!     .with_param("fps", 60u32)
//!     .without_env()
//!     .with_init()
//!     .build()
//!     .unwrap();
//!
//! assert_eq!(root.fps.get(), 60);
//! assert!(root.set_param_val("fps", 500u32).is_err());
//! ```
//!
//! ## Lifecycle
//!
//! | Step | Order |
//! |------|-------|
//! | `init()` | `pre_init`, children in insertion order, `post_init` |
//! | `uninit()` | `pre_uninit`, children in reverse order, `post_uninit` |
//!
//! A child added to an initialized parent is initialized before
//! `add_sub_component` returns. Dropping the [`Root`](component::Root)
//! uninitializes the whole tree.
//!
//! ## Serial ports
//!
//! [`serial::Serial`] is a ready-made component exposing a POSIX serial port
//! as a line-oriented [`UserInterface`](user_interface::UserInterface).

pub mod builder;
pub mod component;
pub mod descriptor;
pub mod error;
pub mod parameter;
pub mod prelude;
pub mod serial;
pub mod user_interface;
pub mod util;

pub use builder::Builder;
pub use error::{Error, Result};
