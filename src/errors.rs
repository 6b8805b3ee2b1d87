use thiserror::Error;

/// Crate-wide result alias
pub type Result<T> = std::result::Result<T, Error>;

/// Everything that can go wrong while modelling a corpus
///
/// Parse failures and unbound-variable errors are raised to the immediate
/// caller and never recovered internally. The remaining variants surface at
/// the top-level operation boundaries (provider construction, `find`,
/// hydration, chain application).
#[derive(Debug, Error)]
pub enum Error {
    /// Invalid descriptor or signature text
    #[error("cannot parse {what} from {text:?} at index {index}: {message}")]
    Parse {
        what: &'static str,
        text: String,
        index: usize,
        message: String,
    },

    /// A type signature containing an unbound type variable was asked for
    /// its erased descriptor
    #[error("type variable '{0}' is not bound to a type parameter")]
    UnboundTypeVariable(String),

    /// A required superclass or interface could not be resolved while the
    /// provider runs in classpath-complete mode
    #[error("class '{name}' required by '{requested_by}' was not found on the classpath")]
    ClasspathIncomplete { name: String, requested_by: String },

    /// Internal invariant: a node outlived the provider core that owns the
    /// identity cache it resolves against
    #[error("class node '{0}' is detached from its provider")]
    DetachedNode(String),

    /// The declared produces/consumes relation between hydration providers
    /// is cyclic
    #[error("hydration provider dependency cycle involving: {}", .0.join(", "))]
    DependencyCycle(Vec<String>),

    /// Two contributed changes target the same reference and refuse to merge
    #[error("cannot merge change {left} with {right}: {reason}")]
    MergeConflict {
        left: String,
        right: String,
        reason: String,
    },

    /// Closing a list of roots failed; every failure is retained
    #[error("failed to close {} class provider root(s)", .0.len())]
    CloseFailure(Vec<std::io::Error>),

    /// Read failure from a source root
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    pub(crate) fn parse(what: &'static str, text: &str, index: usize, message: impl Into<String>) -> Error {
        Error::Parse {
            what,
            text: text.to_string(),
            index,
            message: message.into(),
        }
    }
}

// `zip` errors always reach us through a root read, so they fold into the
// I/O variant rather than growing the taxonomy.
impl From<zip::result::ZipError> for Error {
    fn from(err: zip::result::ZipError) -> Error {
        match err {
            zip::result::ZipError::Io(io) => Error::Io(io),
            other => Error::Io(std::io::Error::new(std::io::ErrorKind::InvalidData, other)),
        }
    }
}
