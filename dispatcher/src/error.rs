use std::fmt;
use thiserror::Error;

/// Result type alias for dispatcher operations
pub type Result<T> = std::result::Result<T, DispatchError>;

/// Accepted argument count for a method call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    /// Non-variadic methods take exactly this many arguments
    Exactly(usize),
    /// Variadic methods take at least their fixed arguments
    AtLeast(usize),
}

impl fmt::Display for Arity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exactly(n) => write!(f, "{}", n),
            Self::AtLeast(n) => write!(f, "at least {}", n),
        }
    }
}

/// Error kinds surfaced by registration, lookup, invocation and coercion
#[derive(Error, Debug)]
pub enum DispatchError {
    /// The registered instance is not a reference to a service object
    #[error("service must be a reference to a service object, got {found}")]
    InvalidServiceType { found: String },

    /// Lookup named a service that was never registered
    #[error("service '{service}' is not registered in the dispatcher")]
    NonExistentService { service: String },

    /// Lookup named a method that was not captured for the service
    #[error("method '{method}' is not registered for service '{service}'")]
    NonExistentMethod { service: String, method: String },

    /// Argument count violates the method's arity
    #[error("invalid number of arguments provided: expected {expected}, got {found}")]
    InvalidArgumentsCount { expected: Arity, found: usize },

    /// An argument's runtime type differs from the declared type
    #[error("invalid argument type at position {position}: expected {expected}, got {found}")]
    InvalidArgumentType {
        position: usize,
        expected: String,
        found: String,
    },

    /// Validate needs a sequence for methods with several parameters
    #[error("invalid arguments, expected slice")]
    InvalidArgExpectedSlice,

    /// The encode/decode round trip could not produce the declared type
    #[error("cannot coerce argument {position} into {expected}: {source}")]
    CoercionFailure {
        position: usize,
        expected: String,
        #[source]
        source: serde_json::Error,
    },

    /// Registration rejected a variadic method under `VariadicPolicy::Reject`
    #[error("method '{method}' is variadic, which this dispatcher does not accept")]
    VariadicNotSupported { method: String },

    /// A captured method table is malformed
    #[error("invalid signature for method '{method}': {reason}")]
    InvalidSignature { method: String, reason: String },

    /// Error returned by the invoked method's own body
    #[error(transparent)]
    Method(#[from] anyhow::Error),

    /// Result values that cannot be encoded
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),
}

impl DispatchError {
    pub(crate) fn invalid_type(position: usize, expected: impl ToString, found: impl ToString) -> Self {
        Self::InvalidArgumentType {
            position,
            expected: expected.to_string(),
            found: found.to_string(),
        }
    }

    /// Stable machine-readable code, used in error responses
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidServiceType { .. } => "INVALID_SERVICE_TYPE",
            Self::NonExistentService { .. } => "SERVICE_NOT_FOUND",
            Self::NonExistentMethod { .. } => "METHOD_NOT_FOUND",
            Self::InvalidArgumentsCount { .. } => "INVALID_ARGUMENTS_COUNT",
            Self::InvalidArgumentType { .. } => "INVALID_ARGUMENT_TYPE",
            Self::InvalidArgExpectedSlice => "EXPECTED_SLICE",
            Self::CoercionFailure { .. } => "COERCION_FAILURE",
            Self::VariadicNotSupported { .. } => "VARIADIC_NOT_SUPPORTED",
            Self::InvalidSignature { .. } => "INVALID_SIGNATURE",
            Self::Method(_) => "METHOD_ERROR",
            Self::Serialization(_) => "SERIALIZATION_ERROR",
            Self::Config(_) => "CONFIG_ERROR",
        }
    }

    /// Whether the caller supplied bad input, as opposed to a lookup miss or method failure
    pub fn is_argument_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidArgumentsCount { .. }
                | Self::InvalidArgumentType { .. }
                | Self::InvalidArgExpectedSlice
                | Self::CoercionFailure { .. }
        )
    }
}
