//! # Deferred Registry
//!
//! Declare registry entries now, construct them later.
//!
//! A [`Builder`] collects the configuration of one named entry of one
//! [`Category`]. Registering it returns a [`Handle`] immediately; the entry
//! itself is built when the host runs its registration pass, and the handle
//! resolves from then on. Side data attached to the builder (display names,
//! tags) is produced in a later, separate generation pass.
//!
//! ## Quick Start
//!
//! ```rust
//! use deferred_registry::{Builder, Category, Registrate};
//!
//! struct Block;
//! struct Item;
//!
//! let host = Registrate::new("demo");
//!
//! let stone = host
//!     .simple((), "stone", Category::of::<Block>(), || Ok("stone block".to_string()))
//!     .register()
//!     .unwrap();
//!
//! // Nothing is constructed yet
//! assert!(stone.get().is_err());
//!
//! host.run_registration().unwrap();
//! assert_eq!(&*stone.get().unwrap(), "stone block");
//!
//! // Same name, other category: a sibling, absent here
//! assert!(stone.get_sibling::<String>(Category::of::<Item>()).is_empty());
//! ```
//!
//! ## Main Types
//!
//! - [`Handle`] - lazily-resolving reference, compared by identity
//! - [`Builder`] / [`BuilderBase`] - deferred declaration of one entry
//! - [`BuilderCallback`] - what a host implements to accept declarations
//! - [`Registrate`] - in-memory host running registration and generation passes
//! - [`RegistrySnapshot`] - versioned live values for reloads

mod builder;
mod category;
mod config;
mod handle;
mod providers;
mod registrate;
mod registry_error;
mod registry_event;
mod snapshot;

pub use builder::{Builder, BuilderBase, BuilderCallback, Factory, SimpleBuilder};
pub use category::{Category, EntryId};
pub use config::RegistrateConfig;
pub use handle::{Binder, Handle};
pub use providers::{DataGenContext, DataProvider, LangProvider, ProviderType, TagsProvider, LANG};
pub use registrate::{Registrate, TraceCallback};
pub use registry_error::{BuildError, DataGenError, HandleError, RegistrateError};
pub use registry_event::RegistryEvent;
pub use snapshot::{ErasedValue, RegistrySnapshot, RegistrySource};
