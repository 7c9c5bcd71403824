//! Error types for argument binding, trail resolution and configuration.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CrumbError {
    /// A required parameter received no value and has no default
    #[error("{function}() missing required argument '{name}'")]
    MissingArgument { function: String, name: String },

    #[error("{function}() takes {expected} positional arguments but {given} were given")]
    TooManyPositional {
        function: String,
        expected: usize,
        given: usize,
    },

    #[error("{function}() got an unexpected keyword argument '{name}'")]
    UnexpectedKeyword { function: String, name: String },

    #[error("{function}() got multiple values for argument '{name}'")]
    MultipleValues { function: String, name: String },

    /// A trail target was passed for a parameter that records values
    #[error("{function}() received a trail target for recorded parameter '{name}'")]
    UnexpectedTarget { function: String, name: String },

    /// The configured trail parameter was bound to a plain value
    #[error("{function}() trail parameter '{name}' is not bound to a trail-capable object")]
    TrailParamNotTarget { function: String, name: String },

    #[error("{function}() has no parameter named '{name}'")]
    UnknownParameter { function: String, name: String },

    #[error("{function}() declares parameter '{name}' more than once")]
    DuplicateParameter { function: String, name: String },

    #[error("{function}() cannot redact its trail parameter '{name}'")]
    RedactedTrailParam { function: String, name: String },

    /// Lookup of a name that was not bound for this call
    #[error("no argument named '{name}' was bound")]
    UnknownArgument { name: String },

    #[error("argument '{name}' could not be read as the requested type")]
    Deserialize {
        name: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("argument '{name}' could not be captured")]
    Capture {
        name: String,
        #[source]
        source: serde_json::Error,
    },
}

impl CrumbError {
    /// Whether the error comes from matching call arguments to the signature.
    pub fn is_binding_error(&self) -> bool {
        matches!(
            self,
            CrumbError::MissingArgument { .. }
                | CrumbError::TooManyPositional { .. }
                | CrumbError::UnexpectedKeyword { .. }
                | CrumbError::MultipleValues { .. }
                | CrumbError::UnexpectedTarget { .. }
        )
    }
}
