//! Lazily-resolving, identity-keyed references to registry entries.
//!
//! A [`Handle`] is handed out the moment an entry is declared, long before the
//! entry exists. The host binds it exactly once during its registration pass.
//! Equality and hashing only look at the [`EntryId`], never at the value.

use std::any::Any;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, Mutex};

use crate::{Category, EntryId, ErasedValue, HandleError, Registrate, RegistrySource};

// -------------------------------------------------------------------------------------------------
// Resolution slot
// -------------------------------------------------------------------------------------------------

enum Resolution<T> {
    Unresolved,
    Resolved { value: Arc<T>, generation: u64 },
}

/// Shared resolution state of one declared entry. Every clone of a handle, and
/// the host itself, points at the same slot.
pub(crate) struct Slot<T> {
    id: EntryId,
    state: Mutex<Resolution<T>>,
}

impl<T: Send + Sync + 'static> Slot<T> {
    pub(crate) fn new(id: EntryId) -> Self {
        Self {
            id,
            state: Mutex::new(Resolution::Unresolved),
        }
    }

    pub(crate) fn id(&self) -> &EntryId {
        &self.id
    }

    pub(crate) fn value(&self) -> Option<Arc<T>> {
        match &*self.state.lock().unwrap_or_else(|p| p.into_inner()) {
            Resolution::Resolved { value, .. } => Some(value.clone()),
            Resolution::Unresolved => None,
        }
    }

    pub(crate) fn bind(&self, value: Arc<T>, generation: u64) -> Result<(), HandleError> {
        let mut state = self.state.lock().unwrap_or_else(|p| p.into_inner());
        if let Resolution::Resolved { .. } = *state {
            return Err(HandleError::AlreadyBound {
                id: self.id.clone(),
            });
        }
        *state = Resolution::Resolved { value, generation };
        Ok(())
    }

    /// Replace the cached value from `source`. Only a bound slot is refreshed,
    /// and never from a source older than its current value.
    fn refresh_from(&self, source: &dyn RegistrySource) -> bool {
        let mut state = self.state.lock().unwrap_or_else(|p| p.into_inner());
        let Resolution::Resolved { generation, .. } = &*state else {
            return false;
        };
        if source.generation() < *generation {
            tracing::trace!(id = %self.id, stale = source.generation(), "ignoring stale snapshot");
            return false;
        }

        let Some(fresh) = source
            .lookup(&self.id)
            .and_then(|value| value.downcast::<T>().ok())
        else {
            return false;
        };

        *state = Resolution::Resolved {
            value: fresh,
            generation: source.generation(),
        };
        true
    }
}

/// Untyped view of a [`Slot`], as the host keeps them.
pub(crate) trait ErasedSlot: Send + Sync {
    fn id(&self) -> &EntryId;
    fn is_bound(&self) -> bool;
    fn refresh(&self, source: &dyn RegistrySource) -> bool;
    /// Whether `value` has the type this slot was declared with.
    fn accepts(&self, value: &ErasedValue) -> bool;
    fn value_type(&self) -> &'static str;
    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
}

impl<T: Send + Sync + 'static> ErasedSlot for Slot<T> {
    fn id(&self) -> &EntryId {
        &self.id
    }

    fn is_bound(&self) -> bool {
        self.value().is_some()
    }

    fn refresh(&self, source: &dyn RegistrySource) -> bool {
        self.refresh_from(source)
    }

    fn accepts(&self, value: &ErasedValue) -> bool {
        (**value).is::<T>()
    }

    fn value_type(&self) -> &'static str {
        std::any::type_name::<T>()
    }

    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

// -------------------------------------------------------------------------------------------------
// Handle
// -------------------------------------------------------------------------------------------------

struct Live<T> {
    owner: Registrate,
    slot: Arc<Slot<T>>,
}

/// A reference to a registry entry that may not exist yet.
///
/// A handle is either *empty* (it will never resolve) or names one
/// `(name, category)` pair and resolves once the host binds it.
///
/// ```rust
/// use deferred_registry::{Handle, HandleError};
///
/// let empty: Handle<String> = Handle::empty();
/// assert_eq!(empty.get(), Err(HandleError::Empty));
/// assert!(empty.get_unchecked().is_none());
/// ```
pub struct Handle<T> {
    live: Option<Live<T>>,
}

impl<T: Send + Sync + 'static> Handle<T> {
    /// The empty handle. It never resolves.
    pub fn empty() -> Self {
        Self { live: None }
    }

    /// A fresh, unbound handle for `id`, owned by `owner`, together with the
    /// only [`Binder`] that can resolve it.
    ///
    /// Intended for custom [`BuilderCallback`](crate::BuilderCallback)
    /// implementations; the handle goes back to the caller, the binder stays
    /// with whoever runs the factory.
    pub fn pending(owner: Registrate, id: EntryId) -> (Self, Binder<T>) {
        let slot = Arc::new(Slot::new(id));
        let binder = Binder {
            owner: owner.clone(),
            slot: slot.clone(),
        };
        (Self::from_slot(owner, slot), binder)
    }

    pub(crate) fn from_slot(owner: Registrate, slot: Arc<Slot<T>>) -> Self {
        Self {
            live: Some(Live { owner, slot }),
        }
    }

    pub(crate) fn slot(&self) -> Option<&Arc<Slot<T>>> {
        self.live.as_ref().map(|live| &live.slot)
    }

    pub fn id(&self) -> Option<&EntryId> {
        self.live.as_ref().map(|live| live.slot.id())
    }

    pub fn is_empty(&self) -> bool {
        self.live.is_none()
    }

    /// Whether a value can be read right now.
    pub fn is_present(&self) -> bool {
        self.get_unchecked().is_some()
    }

    /// Get the entry, failing if it is not present for any reason.
    ///
    /// # Errors
    ///
    /// - [`HandleError::Empty`] for the empty handle
    /// - [`HandleError::NotPresent`] if the entry has not been constructed
    pub fn get(&self) -> Result<Arc<T>, HandleError> {
        let live = self.live.as_ref().ok_or(HandleError::Empty)?;
        live.slot.value().ok_or_else(|| HandleError::NotPresent {
            id: live.slot.id().clone(),
        })
    }

    /// Get the entry without any checks.
    pub fn get_unchecked(&self) -> Option<Arc<T>> {
        self.live.as_ref().and_then(|live| live.slot.value())
    }

    /// Update the cached value from `source`.
    ///
    /// Returns `Ok(true)` if the value was replaced, `Ok(false)` if the handle
    /// is unbound, the source is older than the current value, or the source
    /// has no value of type `T` for this id.
    ///
    /// # Errors
    ///
    /// [`HandleError::Empty`] if this is the empty handle.
    pub fn update_reference(&self, source: &dyn RegistrySource) -> Result<bool, HandleError> {
        let live = self.live.as_ref().ok_or(HandleError::Empty)?;
        Ok(live.slot.refresh_from(source))
    }

    /// Keep this handle if it has no value yet or if its value matches
    /// `predicate`; otherwise return the empty handle.
    ///
    /// The predicate only ever sees a bound value.
    pub fn filter(&self, predicate: impl FnOnce(&T) -> bool) -> Handle<T> {
        if let Some(value) = self.get_unchecked() {
            if !predicate(&value) {
                return Handle::empty();
            }
        }
        self.clone()
    }

    /// The entry with the same name registered under `category`, or the empty
    /// handle if there is none.
    pub fn get_sibling<U: Send + Sync + 'static>(&self, category: Category) -> Handle<U> {
        match &self.live {
            Some(live) => live.owner.get(live.slot.id().name(), category),
            None => Handle::empty(),
        }
    }

    /// Whether the resolved value is `candidate` itself.
    ///
    /// # Errors
    ///
    /// Fails the same way [`Handle::get`] does.
    pub fn is(&self, candidate: &Arc<T>) -> Result<bool, HandleError> {
        Ok(Arc::ptr_eq(&self.get()?, candidate))
    }
}

impl<T> Clone for Handle<T> {
    fn clone(&self) -> Self {
        Self {
            live: self.live.as_ref().map(|live| Live {
                owner: live.owner.clone(),
                slot: live.slot.clone(),
            }),
        }
    }
}

impl<T: Send + Sync + 'static> Default for Handle<T> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<T> PartialEq for Handle<T> {
    fn eq(&self, other: &Self) -> bool {
        let this = self.live.as_ref().map(|live| &live.slot.id);
        let that = other.live.as_ref().map(|live| &live.slot.id);
        this == that
    }
}

impl<T> Eq for Handle<T> {}

impl<T> Hash for Handle<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.live.as_ref().map(|live| &live.slot.id).hash(state);
    }
}

impl<T: Send + Sync + 'static> fmt::Debug for Handle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.live {
            None => f.write_str("Handle(empty)"),
            Some(live) => f
                .debug_struct("Handle")
                .field("id", live.slot.id())
                .field("bound", &live.slot.value().is_some())
                .finish(),
        }
    }
}

// -------------------------------------------------------------------------------------------------
// Binder
// -------------------------------------------------------------------------------------------------

/// The resolving side of a handle made by [`Handle::pending`].
///
/// Binding consumes the binder, so a pending handle is bound at most once and
/// only by the code that constructed its value.
pub struct Binder<T> {
    owner: Registrate,
    slot: Arc<Slot<T>>,
}

impl<T: Send + Sync + 'static> Binder<T> {
    pub fn id(&self) -> &EntryId {
        self.slot.id()
    }

    /// Resolve every handle sharing this binder's slot to `value`.
    pub fn bind(self, value: Arc<T>) -> Result<(), HandleError> {
        self.slot.bind(value, self.owner.generation())
    }
}

impl<T> fmt::Debug for Binder<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Binder").field(&self.slot.id).finish()
    }
}

// -------------------------------------------------------------------------------------------------
// Tests
// -------------------------------------------------------------------------------------------------
