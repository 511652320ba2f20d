//! Builders: configuration for one entry whose construction is deferred.
//!
//! A builder accumulates everything needed to construct one named entry of one
//! category. Calling [`Builder::register`] hands a factory to the
//! [`BuilderCallback`] and returns a [`Handle`] right away; the factory runs
//! later, when the host's registration pass gets to it.
//!
//! Concrete builders hold a [`BuilderBase`] and implement
//! [`Builder::create_entry`]:
//!
//! ```rust
//! use deferred_registry::{BuildError, Builder, BuilderBase, Category, Registrate};
//!
//! struct Item;
//!
//! #[derive(Debug)]
//! struct Widget {
//!     durability: u32,
//! }
//!
//! struct WidgetBuilder {
//!     base: BuilderBase<Widget, ()>,
//!     durability: Option<u32>,
//! }
//!
//! impl WidgetBuilder {
//!     fn durability(mut self, durability: u32) -> Self {
//!         self.durability = Some(durability);
//!         self
//!     }
//! }
//!
//! impl Builder for WidgetBuilder {
//!     type Entry = Widget;
//!     type Parent = ();
//!
//!     fn base(&self) -> &BuilderBase<Widget, ()> {
//!         &self.base
//!     }
//!
//!     fn base_mut(&mut self) -> &mut BuilderBase<Widget, ()> {
//!         &mut self.base
//!     }
//!
//!     fn create_entry(&self) -> Result<Widget, BuildError> {
//!         let durability = self.durability.ok_or(BuildError::Missing { field: "durability" })?;
//!         Ok(Widget { durability })
//!     }
//! }
//!
//! let host = Registrate::new("demo");
//! let widget = WidgetBuilder {
//!     base: BuilderBase::new(host.clone(), (), "widget", Category::of::<Item>()),
//!     durability: None,
//! }
//! .durability(64)
//! .register()
//! .unwrap();
//!
//! assert!(!widget.is_present());
//! host.run_registration().unwrap();
//! assert_eq!(widget.get().unwrap().durability, 64);
//! ```

use std::sync::Arc;

use indexmap::IndexMap;

use crate::providers::{self, EntryDataCallback, ProviderKey};
use crate::{
    BuildError, Category, DataGenContext, DataGenError, DataProvider, Handle, LangProvider,
    ProviderType, Registrate, RegistrateError, TagsProvider, LANG,
};

/// Deferred constructor handed to a [`BuilderCallback`]. Being `FnOnce`, it
/// can run at most once.
pub type Factory<T> = Box<dyn FnOnce() -> Result<T, BuildError> + Send>;

/// Side-data callbacks of one entry, grouped by provider in the order the
/// providers were first used.
pub(crate) type DataCallbacks<T> = IndexMap<ProviderKey, Vec<EntryDataCallback<T>>>;

/// The host side of registration.
///
/// `accept` must run `factory` at most once, at a time of the host's
/// choosing, and return a handle that becomes bound exactly when that run
/// succeeds. Implementations outside [`Registrate`] create the handle with
/// [`Handle::pending`] and keep its [`Binder`](crate::Binder) next to the
/// factory.
pub trait BuilderCallback<T>: Send + Sync {
    fn accept(
        &self,
        name: &str,
        category: Category,
        factory: Factory<T>,
    ) -> Result<Handle<T>, RegistrateError>;
}

/// State shared by every builder.
pub struct BuilderBase<T, P> {
    owner: Registrate,
    parent: P,
    name: String,
    category: Category,
    callback: Arc<dyn BuilderCallback<T>>,
    data: DataCallbacks<T>,
}

impl<T: Send + Sync + 'static, P> BuilderBase<T, P> {
    /// A builder base that registers through `owner` itself.
    pub fn new(owner: Registrate, parent: P, name: impl Into<String>, category: Category) -> Self {
        let callback: Arc<dyn BuilderCallback<T>> = Arc::new(owner.clone());
        Self::with_callback(owner, parent, name, category, callback)
    }

    pub fn with_callback(
        owner: Registrate,
        parent: P,
        name: impl Into<String>,
        category: Category,
        callback: Arc<dyn BuilderCallback<T>>,
    ) -> Self {
        Self {
            owner,
            parent,
            name: name.into(),
            category,
            callback,
            data: IndexMap::new(),
        }
    }

    pub fn owner(&self) -> &Registrate {
        &self.owner
    }

    pub fn parent(&self) -> &P {
        &self.parent
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn category(&self) -> Category {
        self.category
    }

    /// Number of side-data callbacks attached under `ptype`.
    pub fn data_count<D: DataProvider>(&self, ptype: ProviderType<D>) -> usize {
        self.data.get(&ptype.key()).map_or(0, Vec::len)
    }

    fn push_data(&mut self, key: ProviderKey, callback: EntryDataCallback<T>) {
        self.data.entry(key).or_default().push(callback);
    }

    fn take_data(&mut self) -> DataCallbacks<T> {
        std::mem::take(&mut self.data)
    }
}

/// A configurable declaration of one registry entry.
///
/// Implementors provide access to their [`BuilderBase`] and the
/// [`create_entry`](Builder::create_entry) hook; everything else has a default.
pub trait Builder: Sized + Send + 'static {
    type Entry: Send + Sync + 'static;
    type Parent: Send + 'static;

    fn base(&self) -> &BuilderBase<Self::Entry, Self::Parent>;

    fn base_mut(&mut self) -> &mut BuilderBase<Self::Entry, Self::Parent>;

    /// Construct the entry from the accumulated configuration.
    ///
    /// Runs lazily during the registration pass, at most once, so it is safe
    /// to bake in values from the builder.
    fn create_entry(&self) -> Result<Self::Entry, BuildError>;

    fn owner(&self) -> &Registrate {
        self.base().owner()
    }

    fn parent(&self) -> &Self::Parent {
        self.base().parent()
    }

    fn name(&self) -> &str {
        self.base().name()
    }

    fn category(&self) -> Category {
        self.base().category()
    }

    /// The handle the owner holds for this builder's name and category; empty
    /// until registered.
    fn entry(&self) -> Handle<Self::Entry> {
        self.owner().get(self.name(), self.category())
    }

    /// Hand construction to the callback and return the (unbound) handle.
    ///
    /// # Errors
    ///
    /// Whatever the callback rejects, and
    /// [`RegistrateError::GenerationStarted`] if side data was attached after
    /// the owner began generating.
    fn register(mut self) -> Result<Handle<Self::Entry>, RegistrateError> {
        let data = self.base_mut().take_data();
        let owner = self.owner().clone();
        let callback = self.base().callback.clone();
        let name = self.name().to_string();
        let category = self.category();

        if !data.is_empty() {
            owner.ensure_data_open(&name, category)?;
        }

        let handle = callback.accept(&name, category, Box::new(move || self.create_entry()))?;
        owner.attach_data(&handle, data)?;
        Ok(handle)
    }

    /// Run `consumer` for this entry when the `ptype` provider runs.
    ///
    /// Repeated calls for one provider append; they run in the order added.
    fn set_data<D, F>(mut self, ptype: ProviderType<D>, consumer: F) -> Self
    where
        D: DataProvider,
        F: Fn(&mut DataGenContext<'_, D, Self::Entry>) -> Result<(), DataGenError>
            + Send
            + Sync
            + 'static,
    {
        self.base_mut()
            .push_data(ptype.key(), providers::erase(ptype.name(), consumer));
        self
    }

    /// Translate the key produced by `key` to the display name derived from
    /// the entry name (see [`LangProvider::automatic_name`]).
    fn lang<K>(self, key: K) -> Self
    where
        K: Fn(&Self::Entry) -> String + Send + Sync + 'static,
    {
        self.set_data(LANG, move |ctx| {
            let key = key(ctx.entry().as_ref());
            let name = LangProvider::automatic_name(ctx.name());
            ctx.provider_mut().add(key, name)
        })
    }

    /// Translate the key produced by `key` to `name`.
    fn lang_with_name<K>(self, key: K, name: impl Into<String>) -> Self
    where
        K: Fn(&Self::Entry) -> String + Send + Sync + 'static,
    {
        let name = name.into();
        self.set_data(LANG, move |ctx| {
            let key = key(ctx.entry().as_ref());
            ctx.provider_mut().add(key, name.clone())
        })
    }

    /// Add this entry to `tag` when the `ptype` tags provider runs.
    fn tag(self, ptype: ProviderType<TagsProvider>, tag: impl Into<String>) -> Self {
        let tag = tag.into();
        self.set_data(ptype, move |ctx| {
            let member = ctx.id().to_string();
            ctx.provider_mut().add(&tag, member);
            Ok(())
        })
    }
}

// -------------------------------------------------------------------------------------------------
// Simple builder
// -------------------------------------------------------------------------------------------------

/// A builder with no configuration of its own: the entry comes from a closure.
pub struct SimpleBuilder<T, P = ()> {
    base: BuilderBase<T, P>,
    factory: Box<dyn Fn() -> Result<T, BuildError> + Send + Sync>,
}

impl<T: Send + Sync + 'static, P> SimpleBuilder<T, P> {
    pub fn new<F>(base: BuilderBase<T, P>, factory: F) -> Self
    where
        F: Fn() -> Result<T, BuildError> + Send + Sync + 'static,
    {
        Self {
            base,
            factory: Box::new(factory),
        }
    }
}

impl<T: Send + Sync + 'static, P: Send + 'static> Builder for SimpleBuilder<T, P> {
    type Entry = T;
    type Parent = P;

    fn base(&self) -> &BuilderBase<T, P> {
        &self.base
    }

    fn base_mut(&mut self) -> &mut BuilderBase<T, P> {
        &mut self.base
    }

    fn create_entry(&self) -> Result<T, BuildError> {
        (self.factory)()
    }
}

// -------------------------------------------------------------------------------------------------
// Tests
// -------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Binder, EntryId};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    struct Item;

    #[derive(Debug, PartialEq)]
    struct Widget {
        color: String,
    }

    struct WidgetBuilder {
        base: BuilderBase<Widget, &'static str>,
        color: Option<String>,
        built: Arc<AtomicUsize>,
    }

    impl WidgetBuilder {
        fn new(base: BuilderBase<Widget, &'static str>) -> Self {
            Self {
                base,
                color: None,
                built: Arc::new(AtomicUsize::new(0)),
            }
        }

        fn color(mut self, color: &str) -> Self {
            self.color = Some(color.to_string());
            self
        }
    }

    impl Builder for WidgetBuilder {
        type Entry = Widget;
        type Parent = &'static str;

        fn base(&self) -> &BuilderBase<Widget, &'static str> {
            &self.base
        }

        fn base_mut(&mut self) -> &mut BuilderBase<Widget, &'static str> {
            &mut self.base
        }

        fn create_entry(&self) -> Result<Widget, BuildError> {
            self.built.fetch_add(1, Ordering::SeqCst);
            let color = self.color.clone().ok_or(BuildError::Missing { field: "color" })?;
            Ok(Widget { color })
        }
    }

    /// Records every `accept` and keeps the factories for the test to run.
    #[derive(Default)]
    struct RecordingCallback {
        calls: Mutex<Vec<(String, Category)>>,
        factories: Mutex<Vec<(Binder<Widget>, Factory<Widget>)>>,
        owner: Mutex<Option<Registrate>>,
    }

    impl BuilderCallback<Widget> for RecordingCallback {
        fn accept(
            &self,
            name: &str,
            category: Category,
            factory: Factory<Widget>,
        ) -> Result<Handle<Widget>, RegistrateError> {
            self.calls.lock().unwrap().push((name.to_string(), category));
            let owner = self.owner.lock().unwrap().clone().unwrap();
            let id = EntryId::new(owner.mod_id(), name, category);
            let (handle, binder) = Handle::pending(owner.clone(), id);
            self.factories.lock().unwrap().push((binder, factory));
            Ok(handle)
        }
    }

    fn recording(host: &Registrate) -> Arc<RecordingCallback> {
        let callback = Arc::new(RecordingCallback::default());
        *callback.owner.lock().unwrap() = Some(host.clone());
        callback
    }

    #[test]
    fn test_accessors() {
        let host = Registrate::new("demo");
        let builder = WidgetBuilder::new(BuilderBase::new(
            host.clone(),
            "parent",
            "widget",
            Category::of::<Item>(),
        ));

        assert_eq!(builder.owner().mod_id(), "demo");
        assert_eq!(*builder.parent(), "parent");
        assert_eq!(builder.name(), "widget");
        assert_eq!(builder.category(), Category::of::<Item>());
        assert!(builder.entry().is_empty());
    }

    #[test]
    fn test_register_calls_callback_once_without_constructing() {
        let host = Registrate::new("demo");
        let callback = recording(&host);
        let builder = WidgetBuilder::new(BuilderBase::with_callback(
            host.clone(),
            "parent",
            "widget",
            Category::of::<Item>(),
            callback.clone(),
        ))
        .color("red");
        let built = builder.built.clone();

        let handle = builder.register().unwrap();

        assert_eq!(
            *callback.calls.lock().unwrap(),
            vec![("widget".to_string(), Category::of::<Item>())]
        );
        assert_eq!(built.load(Ordering::SeqCst), 0);
        assert!(!handle.is_present());

        let (binder, factory) = callback.factories.lock().unwrap().pop().unwrap();
        binder.bind(Arc::new(factory().unwrap())).unwrap();

        assert_eq!(built.load(Ordering::SeqCst), 1);
        assert_eq!(handle.get().unwrap().color, "red");
    }

    #[test]
    fn test_create_entry_failure_surfaces() {
        let host = Registrate::new("demo");
        let callback = recording(&host);
        let handle = WidgetBuilder::new(BuilderBase::with_callback(
            host.clone(),
            "parent",
            "widget",
            Category::of::<Item>(),
            callback.clone(),
        ))
        .register()
        .unwrap();

        let (_, factory) = callback.factories.lock().unwrap().pop().unwrap();
        let err = factory().unwrap_err();
        assert_eq!(err.to_string(), "missing required field `color`");
        assert!(!handle.is_present());
    }

    #[test]
    fn test_set_data_appends_per_provider() {
        const TAGS: ProviderType<TagsProvider> = ProviderType::new("tags");

        let host = Registrate::new("demo");
        let builder = WidgetBuilder::new(BuilderBase::new(
            host,
            "parent",
            "widget",
            Category::of::<Item>(),
        ))
        .lang(|_| "item.demo.widget".to_string())
        .lang_with_name(|_| "item.demo.widget.alt".to_string(), "Custom")
        .tag(TAGS, "tools")
        .tag(TAGS, "shiny")
        .tag(TAGS, "tools");

        assert_eq!(builder.base().data_count(LANG), 2);
        assert_eq!(builder.base().data_count(TAGS), 3);
    }

    #[test]
    fn test_simple_builder() {
        let host = Registrate::new("demo");
        let builder = SimpleBuilder::new(
            BuilderBase::new(host, (), "answer", Category::of::<Item>()),
            || Ok(42u32),
        );

        assert_eq!(builder.create_entry().unwrap(), 42);
        assert_eq!(builder.create_entry().unwrap(), 42);
    }
}
