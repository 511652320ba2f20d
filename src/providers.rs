//! Side data produced for entries during generation passes.
//!
//! Builders attach closures keyed by a [`ProviderType`]; the host runs them
//! later, one provider at a time, handing each a [`DataGenContext`] with the
//! resolved entry.

use std::any::{Any, TypeId};
use std::collections::BTreeMap;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use crate::{DataGenError, EntryId};

/// Marker for values that collect generated data.
pub trait DataProvider: Any + Send {}

/// Opaque key naming one generation pass and the provider it runs with.
pub struct ProviderType<D> {
    name: &'static str,
    _provider: PhantomData<fn() -> D>,
}

/// Naming data, run with a [`LangProvider`].
pub const LANG: ProviderType<LangProvider> = ProviderType::new("lang");

impl<D> ProviderType<D> {
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            _provider: PhantomData,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl<D: DataProvider> ProviderType<D> {
    pub(crate) fn key(&self) -> ProviderKey {
        ProviderKey {
            name: self.name,
            provider: TypeId::of::<D>(),
        }
    }
}

impl<D> Clone for ProviderType<D> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<D> Copy for ProviderType<D> {}

impl<D> fmt::Debug for ProviderType<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ProviderType({})", self.name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct ProviderKey {
    pub(crate) name: &'static str,
    provider: TypeId,
}

/// What a side-data callback gets to see: the provider being filled and the
/// entry it runs for.
pub struct DataGenContext<'a, D, T> {
    provider: &'a mut D,
    entry: Arc<T>,
    id: &'a EntryId,
}

impl<'a, D, T> DataGenContext<'a, D, T> {
    pub fn new(provider: &'a mut D, entry: Arc<T>, id: &'a EntryId) -> Self {
        Self {
            provider,
            entry,
            id,
        }
    }

    pub fn provider(&self) -> &D {
        &*self.provider
    }

    pub fn provider_mut(&mut self) -> &mut D {
        &mut *self.provider
    }

    pub fn entry(&self) -> &Arc<T> {
        &self.entry
    }

    pub fn id(&self) -> &EntryId {
        self.id
    }

    pub fn name(&self) -> &str {
        self.id.name()
    }
}

/// A side-data callback with its provider type erased, still typed on the entry.
pub(crate) type EntryDataCallback<T> =
    Box<dyn Fn(&mut dyn Any, &EntryId, Arc<T>) -> Result<(), DataGenError> + Send + Sync>;

pub(crate) fn erase<D, T, F>(name: &'static str, consumer: F) -> EntryDataCallback<T>
where
    D: DataProvider,
    T: Send + Sync + 'static,
    F: Fn(&mut DataGenContext<'_, D, T>) -> Result<(), DataGenError> + Send + Sync + 'static,
{
    Box::new(move |provider: &mut dyn Any, id: &EntryId, entry: Arc<T>| {
        let provider = provider
            .downcast_mut::<D>()
            .ok_or_else(|| DataGenError::Other(format!("provider mismatch for `{}`", name)))?;
        consumer(&mut DataGenContext::new(provider, entry, id))
    })
}

// -------------------------------------------------------------------------------------------------
// Lang
// -------------------------------------------------------------------------------------------------

/// Translation keys and their display text for one locale.
#[derive(Debug, Clone, Default)]
pub struct LangProvider {
    locale: String,
    entries: BTreeMap<String, String>,
}

impl LangProvider {
    pub fn new(locale: impl Into<String>) -> Self {
        Self {
            locale: locale.into(),
            entries: BTreeMap::new(),
        }
    }

    pub fn locale(&self) -> &str {
        &self.locale
    }

    /// Add a translation.
    ///
    /// # Errors
    ///
    /// [`DataGenError::DuplicateKey`] if `key` was already added.
    pub fn add(
        &mut self,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Result<(), DataGenError> {
        let key = key.into();
        if self.entries.contains_key(&key) {
            return Err(DataGenError::DuplicateKey { key });
        }
        self.entries.insert(key, value.into());
        Ok(())
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    pub fn entries(&self) -> &BTreeMap<String, String> {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// English display name derived from a registry name:
    /// `"widget_block"` becomes `"Widget Block"`.
    pub fn automatic_name(name: &str) -> String {
        name.split('_')
            .filter(|word| !word.is_empty())
            .map(|word| {
                let mut chars = word.chars();
                match chars.next() {
                    Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                    None => String::new(),
                }
            })
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl DataProvider for LangProvider {}

// -------------------------------------------------------------------------------------------------
// Tags
// -------------------------------------------------------------------------------------------------

/// Tag membership: tag name to the ids of its members, in insertion order.
#[derive(Debug, Clone, Default)]
pub struct TagsProvider {
    tags: BTreeMap<String, Vec<String>>,
}

impl TagsProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `member` to `tag`. Adding the same member twice is a no-op.
    pub fn add(&mut self, tag: &str, member: impl Into<String>) {
        let member = member.into();
        let members = self.tags.entry(tag.to_string()).or_default();
        if !members.contains(&member) {
            members.push(member);
        }
    }

    pub fn members(&self, tag: &str) -> &[String] {
        self.tags.get(tag).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn tags(&self) -> impl Iterator<Item = &str> {
        self.tags.keys().map(String::as_str)
    }
}

impl DataProvider for TagsProvider {}
