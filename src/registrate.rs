//! The registration host.
//!
//! [`Registrate`] collects declared entries, defers their construction until
//! [`run_registration`](Registrate::run_registration), and runs side-data
//! callbacks during [`generate`](Registrate::generate). It is cheap to clone;
//! every clone refers to the same host.
//!
//! # Examples
//!
//! ```
//! use deferred_registry::{Builder, Category, LangProvider, Registrate, LANG};
//!
//! struct Item;
//!
//! let host = Registrate::new("demo");
//! let answer = host
//!     .simple((), "answer", Category::of::<Item>(), || Ok(42u32))
//!     .lang(|_| "item.demo.answer".to_string())
//!     .register()
//!     .unwrap();
//!
//! host.run_registration().unwrap();
//! assert_eq!(*answer.get().unwrap(), 42);
//!
//! let mut lang = host.lang_provider();
//! host.generate(LANG, &mut lang).unwrap();
//! assert_eq!(lang.get("item.demo.answer"), Some("Answer"));
//! ```

use std::any::Any;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

use indexmap::IndexMap;

use crate::builder::DataCallbacks;
use crate::handle::{ErasedSlot, Slot};
use crate::providers::ProviderKey;
use crate::snapshot::{ErasedValue, RegistrySource};
use crate::{
    BuildError, BuilderBase, BuilderCallback, Category, DataGenError, DataProvider, EntryId,
    Factory, Handle, HandleError, LangProvider, ProviderType, RegistrateConfig, RegistrateError,
    RegistryEvent, RegistrySnapshot, SimpleBuilder,
};

/// Type alias for the user-supplied tracing callback.
///
/// The callback receives a reference to a `RegistryEvent` every time the host
/// declares, binds, looks up, generates or reloads.
pub type TraceCallback = dyn Fn(&RegistryEvent) + Send + Sync + 'static;

type Construct = Box<dyn FnOnce(u64) -> Result<ErasedValue, RegistrateError> + Send>;

type HostDataCallback = Arc<dyn Fn(&mut dyn Any) -> Result<(), DataGenError> + Send + Sync>;

struct Pending {
    id: EntryId,
    construct: Construct,
}

#[derive(Default)]
struct State {
    /// Every declared entry, in declaration order.
    entries: IndexMap<EntryId, Arc<dyn ErasedSlot>>,
    pending: Vec<Pending>,
    closed: HashSet<Category>,
    data: IndexMap<ProviderKey, Vec<(EntryId, HostDataCallback)>>,
    generating: bool,
    values: HashMap<EntryId, ErasedValue>,
    generation: u64,
}

struct Inner {
    config: RegistrateConfig,
    state: Mutex<State>,
    trace: Mutex<Option<Arc<TraceCallback>>>,
}

/// An in-memory registration host.
#[derive(Clone)]
pub struct Registrate {
    inner: Arc<Inner>,
}

impl Registrate {
    pub fn new(mod_id: impl Into<String>) -> Self {
        Self::with_config(RegistrateConfig::new(mod_id))
    }

    pub fn with_config(config: RegistrateConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                config,
                state: Mutex::new(State::default()),
                trace: Mutex::new(None),
            }),
        }
    }

    pub fn config(&self) -> &RegistrateConfig {
        &self.inner.config
    }

    pub fn mod_id(&self) -> &str {
        &self.inner.config.mod_id
    }

    /// A fresh lang provider for the configured locale.
    pub fn lang_provider(&self) -> LangProvider {
        LangProvider::new(self.inner.config.locale.clone())
    }

    /// The id `name` has in `category` within this host.
    pub fn id(&self, name: &str, category: Category) -> EntryId {
        EntryId::new(self.mod_id(), name, category)
    }

    // The state lock is never held while user code (factories, side-data
    // callbacks, the trace callback) runs.
    fn state(&self) -> MutexGuard<'_, State> {
        self.inner.state.lock().unwrap_or_else(|p| p.into_inner())
    }

    // -------------------------------------------------------------------------------------------------
    // Tracing
    // -------------------------------------------------------------------------------------------------

    /// Sets a tracing callback that will be invoked on every host interaction.
    ///
    /// The callback may call back into the host.
    pub fn set_trace_callback(&self, callback: impl Fn(&RegistryEvent) + Send + Sync + 'static) {
        let mut guard = self.inner.trace.lock().unwrap_or_else(|p| p.into_inner());
        *guard = Some(Arc::new(callback));
    }

    /// Clears the tracing callback.
    pub fn clear_trace_callback(&self) {
        let mut guard = self.inner.trace.lock().unwrap_or_else(|p| p.into_inner());
        *guard = None;
    }

    fn emit_event(&self, event: RegistryEvent) {
        let callback = self
            .inner
            .trace
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .clone();
        if let Some(callback) = callback {
            callback(&event);
        }
    }

    // -------------------------------------------------------------------------------------------------
    // Declaration
    // -------------------------------------------------------------------------------------------------

    /// A builder whose entry comes from `factory`.
    pub fn simple<T, P, F>(
        &self,
        parent: P,
        name: impl Into<String>,
        category: Category,
        factory: F,
    ) -> SimpleBuilder<T, P>
    where
        T: Send + Sync + 'static,
        F: Fn() -> Result<T, BuildError> + Send + Sync + 'static,
    {
        SimpleBuilder::new(
            BuilderBase::new(self.clone(), parent, name, category),
            factory,
        )
    }

    fn declare<T: Send + Sync + 'static>(
        &self,
        name: &str,
        category: Category,
        factory: Factory<T>,
    ) -> Result<Handle<T>, RegistrateError> {
        let id = self.id(name, category);
        let slot = Arc::new(Slot::<T>::new(id.clone()));
        {
            let mut state = self.state();
            if state.closed.contains(&category) {
                return Err(RegistrateError::RegistrationClosed { id });
            }
            if state.entries.contains_key(&id) {
                return Err(RegistrateError::Duplicate { id });
            }

            state.entries.insert(id.clone(), slot.clone());

            let target = slot.clone();
            let construct_id = id.clone();
            state.pending.push(Pending {
                id: id.clone(),
                construct: Box::new(move |generation: u64| {
                    let value = Arc::new(factory().map_err(|source| {
                        RegistrateError::Construction {
                            id: construct_id,
                            source,
                        }
                    })?);
                    target.bind(value.clone(), generation)?;
                    Ok(value as ErasedValue)
                }),
            });
        }

        tracing::debug!(%id, category = %category, "declared entry");
        self.emit_event(RegistryEvent::Declare { id });
        Ok(Handle::from_slot(self.clone(), slot))
    }

    pub(crate) fn ensure_data_open(
        &self,
        name: &str,
        category: Category,
    ) -> Result<(), RegistrateError> {
        if self.state().generating {
            return Err(RegistrateError::GenerationStarted {
                id: self.id(name, category),
            });
        }
        Ok(())
    }

    /// Queue an entry's side-data callbacks behind every callback already
    /// queued for the same providers.
    pub(crate) fn attach_data<T: Send + Sync + 'static>(
        &self,
        handle: &Handle<T>,
        data: DataCallbacks<T>,
    ) -> Result<(), RegistrateError> {
        if data.is_empty() {
            return Ok(());
        }
        let slot = handle.slot().ok_or(HandleError::Empty)?.clone();

        let mut state = self.state();
        if state.generating {
            return Err(RegistrateError::GenerationStarted {
                id: slot.id().clone(),
            });
        }

        for (key, callbacks) in data {
            let queue = state.data.entry(key).or_default();
            for callback in callbacks {
                let id = slot.id().clone();
                let slot = slot.clone();
                let run: HostDataCallback = Arc::new(move |provider: &mut dyn Any| {
                    let entry = slot.value().ok_or_else(|| HandleError::NotPresent {
                        id: slot.id().clone(),
                    })?;
                    callback(provider, slot.id(), entry)
                });
                queue.push((id, run));
            }
        }
        Ok(())
    }

    // -------------------------------------------------------------------------------------------------
    // Lookup
    // -------------------------------------------------------------------------------------------------

    /// The handle declared as `name` in `category`.
    ///
    /// Returns the empty handle if no such entry was declared, or if it was
    /// declared with a type other than `T`.
    pub fn get<T: Send + Sync + 'static>(&self, name: &str, category: Category) -> Handle<T> {
        let id = self.id(name, category);
        let slot = self
            .state()
            .entries
            .get(&id)
            .cloned()
            .and_then(|slot| slot.into_any().downcast::<Slot<T>>().ok());

        let found = slot.is_some();
        tracing::trace!(%id, found, "lookup");
        self.emit_event(RegistryEvent::Lookup { id, found });

        match slot {
            Some(slot) => Handle::from_slot(self.clone(), slot),
            None => Handle::empty(),
        }
    }

    /// Whether `name` was declared in `category`, whatever its type.
    pub fn contains(&self, name: &str, category: Category) -> bool {
        self.state().entries.contains_key(&self.id(name, category))
    }

    /// Number of declared entries.
    pub fn len(&self) -> usize {
        self.state().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state().entries.is_empty()
    }

    /// Number of entries still waiting for their registration pass.
    pub fn pending_count(&self) -> usize {
        self.state().pending.len()
    }

    /// Declared entries that are not bound, in declaration order.
    pub fn unbound(&self) -> Vec<EntryId> {
        self.state()
            .entries
            .values()
            .filter(|slot| !slot.is_bound())
            .map(|slot| slot.id().clone())
            .collect()
    }

    /// Whether the registration pass for `category` has completed.
    pub fn is_closed(&self, category: Category) -> bool {
        self.state().closed.contains(&category)
    }

    /// The current generation of the live values.
    pub fn generation(&self) -> u64 {
        self.state().generation
    }

    // -------------------------------------------------------------------------------------------------
    // Registration pass
    // -------------------------------------------------------------------------------------------------

    /// Run the registration pass for every category with pending entries,
    /// categories in the order they were first declared.
    ///
    /// Entries a factory declares in another open category are picked up too;
    /// nothing is left pending when this returns `Ok`. Returns the number of
    /// entries constructed.
    ///
    /// # Errors
    ///
    /// Stops at the first entry whose construction fails. That entry is
    /// abandoned; entries not reached yet stay pending.
    pub fn run_registration(&self) -> Result<usize, RegistrateError> {
        let mut constructed = 0;
        // Each pass closes its category, so this runs at most once per category.
        while let Some(category) = self.next_pending_category() {
            constructed += self.run_registration_for(category)?;
        }
        Ok(constructed)
    }

    fn next_pending_category(&self) -> Option<Category> {
        self.state()
            .pending
            .first()
            .map(|pending| pending.id.category())
    }

    /// Construct and bind every pending entry of `category`, in declaration
    /// order, then close the category to further declarations.
    ///
    /// # Errors
    ///
    /// Stops at the first entry whose construction fails; the category stays
    /// open.
    pub fn run_registration_for(&self, category: Category) -> Result<usize, RegistrateError> {
        let generation = {
            let mut state = self.state();
            state.generation += 1;
            state.generation
        };
        tracing::debug!(category = %category, generation, "registration pass");

        let mut constructed = 0;
        loop {
            // Entries declared by a running factory join this same pass.
            let next = {
                let mut state = self.state();
                state
                    .pending
                    .iter()
                    .position(|pending| pending.id.category() == category)
                    .map(|index| state.pending.remove(index))
            };
            let Some(Pending { id, construct }) = next else {
                break;
            };

            let value = match construct(generation) {
                Ok(value) => value,
                Err(err) => {
                    tracing::warn!(%id, error = %err, "registration abandoned");
                    return Err(err);
                }
            };

            self.state().values.insert(id.clone(), value);
            tracing::trace!(%id, "bound");
            self.emit_event(RegistryEvent::Bind { id });
            constructed += 1;
        }

        self.state().closed.insert(category);
        Ok(constructed)
    }

    // -------------------------------------------------------------------------------------------------
    // Generation pass
    // -------------------------------------------------------------------------------------------------

    /// Run every side-data callback queued for `ptype` against `provider`, in
    /// the order they were attached.
    ///
    /// Once any generation pass starts, no more side data can be attached.
    ///
    /// # Errors
    ///
    /// Stops at the first failing callback, including one whose entry was
    /// never constructed.
    pub fn generate<D: DataProvider>(
        &self,
        ptype: ProviderType<D>,
        provider: &mut D,
    ) -> Result<usize, RegistrateError> {
        let callbacks = {
            let mut state = self.state();
            state.generating = true;
            state.data.get(&ptype.key()).cloned().unwrap_or_default()
        };

        let provider: &mut dyn Any = provider;
        for (id, callback) in &callbacks {
            callback(&mut *provider).map_err(|source| RegistrateError::DataGen {
                id: id.clone(),
                source,
            })?;
        }

        tracing::debug!(provider = ptype.name(), callbacks = callbacks.len(), "generated");
        self.emit_event(RegistryEvent::Generate {
            provider: ptype.name(),
            callbacks: callbacks.len(),
        });
        Ok(callbacks.len())
    }

    // -------------------------------------------------------------------------------------------------
    // Reload
    // -------------------------------------------------------------------------------------------------

    /// A copy of the live values at the current generation.
    pub fn snapshot(&self) -> RegistrySnapshot {
        let state = self.state();
        RegistrySnapshot::from_values(state.generation, state.values.clone())
    }

    /// Replace live values from `snapshot` and refresh every bound handle.
    ///
    /// Values for ids that were never declared, or are not bound yet, are
    /// ignored. The reload gets a new generation, so handles refreshed here
    /// will not be moved back by an older snapshot. Returns the number of
    /// handles refreshed.
    ///
    /// # Errors
    ///
    /// [`RegistrateError::ReloadType`] if a value is not of the type its entry
    /// was declared with. Nothing is replaced in that case.
    pub fn reload(&self, snapshot: RegistrySnapshot) -> Result<usize, RegistrateError> {
        let (source, slots) = {
            let mut state = self.state();

            let mut accepted = Vec::new();
            for (id, value) in snapshot.into_values() {
                let Some(slot) = state.entries.get(&id) else {
                    tracing::warn!(%id, "reload skipped undeclared entry");
                    continue;
                };
                if !slot.is_bound() {
                    tracing::trace!(%id, "reload skipped unbound entry");
                    continue;
                }
                if !slot.accepts(&value) {
                    return Err(RegistrateError::ReloadType {
                        expected: slot.value_type(),
                        id,
                    });
                }
                accepted.push((id, value));
            }

            state.generation += 1;
            state.values.extend(accepted);

            let source = RegistrySnapshot::from_values(state.generation, state.values.clone());
            let slots: Vec<Arc<dyn ErasedSlot>> = state.entries.values().cloned().collect();
            (source, slots)
        };

        let refreshed = slots.iter().filter(|slot| slot.refresh(&source)).count();

        tracing::debug!(generation = source.generation(), refreshed, "reloaded");
        self.emit_event(RegistryEvent::Reload {
            generation: source.generation(),
            refreshed,
        });
        Ok(refreshed)
    }
}

impl<T: Send + Sync + 'static> BuilderCallback<T> for Registrate {
    fn accept(
        &self,
        name: &str,
        category: Category,
        factory: Factory<T>,
    ) -> Result<Handle<T>, RegistrateError> {
        self.declare(name, category, factory)
    }
}

impl std::fmt::Debug for Registrate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state();
        f.debug_struct("Registrate")
            .field("mod_id", &self.mod_id())
            .field("entries", &state.entries.len())
            .field("pending", &state.pending.len())
            .field("generation", &state.generation)
            .finish()
    }
}

// -------------------------------------------------------------------------------------------------
// Tests
// -------------------------------------------------------------------------------------------------
