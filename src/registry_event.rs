use crate::EntryId;

/// Events emitted by the registration host.
///
/// These events are passed to the tracing callback set via
/// [`Registrate::set_trace_callback`](crate::Registrate::set_trace_callback).
/// The `Clone` derive allows callbacks to store or forward events if needed.
///
/// # Examples
///
/// ```rust
/// use deferred_registry::RegistryEvent;
///
/// let event = RegistryEvent::Generate { provider: "lang", callbacks: 3 };
/// assert_eq!(event.to_string(), "generate { provider: lang, callbacks: 3 }");
/// ```
#[derive(Debug, Clone)]
pub enum RegistryEvent {
    /// An entry was declared and its construction deferred.
    Declare { id: EntryId },

    /// A deferred factory ran and the entry's handle was bound.
    Bind { id: EntryId },

    /// An entry was looked up by name and category.
    Lookup {
        /// The id that was looked up
        id: EntryId,
        /// Whether an entry of the requested type exists under that id
        found: bool,
    },

    /// A generation pass ran for one provider.
    Generate {
        provider: &'static str,
        callbacks: usize,
    },

    /// Live values were replaced from a snapshot.
    Reload { generation: u64, refreshed: usize },
}

impl std::fmt::Display for RegistryEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RegistryEvent::Declare { id } => write!(f, "declare {{ id: {} }}", id),
            RegistryEvent::Bind { id } => write!(f, "bind {{ id: {} }}", id),
            RegistryEvent::Lookup { id, found } => write!(
                f,
                "lookup {{ id: {}, category: {}, found: {} }}",
                id,
                id.category(),
                found
            ),
            RegistryEvent::Generate {
                provider,
                callbacks,
            } => write!(
                f,
                "generate {{ provider: {}, callbacks: {} }}",
                provider, callbacks
            ),
            RegistryEvent::Reload {
                generation,
                refreshed,
            } => write!(
                f,
                "reload {{ generation: {}, refreshed: {} }}",
                generation, refreshed
            ),
        }
    }
}
