use crate::EntryId;

/// Failure to access the value behind a [`Handle`](crate::Handle).
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum HandleError {
    /// The handle is the empty sentinel and will never resolve.
    #[error("Registry entry is empty")]
    Empty,

    /// The handle names an entry that has not been constructed (yet).
    #[error("Registry entry not present: {id}")]
    NotPresent { id: EntryId },

    /// The host tried to bind a handle that already holds a value.
    #[error("Registry entry already bound: {id}")]
    AlreadyBound { id: EntryId },
}

/// Failure raised by a builder's `create_entry`.
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    /// A required builder field was never set.
    #[error("missing required field `{field}`")]
    Missing { field: &'static str },

    /// The accumulated configuration is inconsistent.
    #[error("invalid configuration: {reason}")]
    Invalid { reason: String },

    /// A dependency of the entry could not be resolved.
    #[error(transparent)]
    Dependency(#[from] HandleError),
}

/// Failure raised by a side-data callback during a generation pass.
#[derive(Debug, thiserror::Error)]
pub enum DataGenError {
    #[error("duplicate key `{key}`")]
    DuplicateKey { key: String },

    #[error(transparent)]
    Handle(#[from] HandleError),

    #[error("{0}")]
    Other(String),
}

/// Errors reported by the registration host.
#[derive(Debug, thiserror::Error)]
pub enum RegistrateError {
    #[error("duplicate registration: {id}")]
    Duplicate { id: EntryId },

    #[error("registration pass already ran for {category}, cannot register {id}", category = .id.category())]
    RegistrationClosed { id: EntryId },

    #[error("data generation already started, cannot attach data for {id}")]
    GenerationStarted { id: EntryId },

    #[error("failed to construct {id}: {source}")]
    Construction {
        id: EntryId,
        #[source]
        source: BuildError,
    },

    #[error("data generation failed for {id}: {source}")]
    DataGen {
        id: EntryId,
        #[source]
        source: DataGenError,
    },

    #[error("reload value for {id} is not a {expected}")]
    ReloadType { id: EntryId, expected: &'static str },

    #[error(transparent)]
    Handle(#[from] HandleError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Category;

    struct Item;

    fn widget() -> EntryId {
        EntryId::new("demo", "widget", Category::of::<Item>())
    }

    #[test]
    fn test_empty_display() {
        let err = HandleError::Empty;
        assert_eq!(err.to_string(), "Registry entry is empty");
    }

    #[test]
    fn test_not_present_display() {
        let err = HandleError::NotPresent { id: widget() };
        assert_eq!(err.to_string(), "Registry entry not present: demo:widget");
    }

    #[test]
    fn test_equality() {
        assert_eq!(HandleError::Empty, HandleError::Empty);
        assert_ne!(HandleError::Empty, HandleError::NotPresent { id: widget() });
    }

    #[test]
    fn test_registration_closed_display() {
        let err = RegistrateError::RegistrationClosed { id: widget() };
        assert_eq!(
            err.to_string(),
            "registration pass already ran for Item, cannot register demo:widget"
        );
    }

    #[test]
    fn test_construction_keeps_source() {
        let err = RegistrateError::Construction {
            id: widget(),
            source: BuildError::Missing { field: "texture" },
        };
        assert_eq!(
            err.to_string(),
            "failed to construct demo:widget: missing required field `texture`"
        );

        let source = std::error::Error::source(&err).map(|s| s.to_string());
        assert_eq!(source.as_deref(), Some("missing required field `texture`"));
    }

    #[test]
    fn test_reload_type_display() {
        let err = RegistrateError::ReloadType {
            id: widget(),
            expected: "u32",
        };
        assert_eq!(err.to_string(), "reload value for demo:widget is not a u32");
    }

    #[test]
    fn test_build_error_from_handle_error() {
        let err: BuildError = HandleError::Empty.into();
        assert_eq!(err.to_string(), "Registry entry is empty");
    }
}
