//! Error types for quickwire container operations.
//!
//! Every error names the type it is about and, where it helps, what
//! required it and how to fix the registration.

use std::fmt;

use quickwire_support::rendering::render_chain;

use crate::key::TypeKey;

/// Boxed error returned by factories and extraction routines.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Main error type for all quickwire operations.
#[derive(Debug, thiserror::Error)]
pub enum QuickwireError {
    /// Registration or seal attempted after the container was sealed.
    #[error("{}", .0)]
    ContainerSealed(ContainerSealedError),

    /// Requested type has no registration and no discoverable constructor.
    #[error("{}", .0)]
    Unconstructable(UnconstructableTypeError),

    /// A resolution-context type was reached without a supplied value.
    #[error("{}", .0)]
    MissingContextValue(MissingContextValueError),

    /// A factory or extraction routine failed.
    #[error("Failed to construct {key}: {source}")]
    ConstructionFailed {
        key: TypeKey,
        #[source]
        source: BoxError,
    },

    /// A type depends on itself, directly or transitively.
    #[error("{}", .0)]
    CircularDependency(CircularDependencyError),

    /// The type already has an explicit registration.
    #[error("{}", .0)]
    AlreadyRegistered(AlreadyRegisteredError),
}

impl QuickwireError {
    /// The type the error is about, when there is one.
    pub fn key(&self) -> Option<TypeKey> {
        match self {
            Self::ContainerSealed(e) => e.attempted,
            Self::Unconstructable(e) => Some(e.requested),
            Self::MissingContextValue(e) => Some(e.key),
            Self::ConstructionFailed { key, .. } => Some(*key),
            Self::CircularDependency(e) => e.chain.last().copied(),
            Self::AlreadyRegistered(e) => Some(e.key),
        }
    }
}

/// Error when the registration table is already sealed.
#[derive(Debug)]
pub struct ContainerSealedError {
    /// The registration that was rejected; `None` for a repeated seal.
    pub attempted: Option<TypeKey>,
}

impl fmt::Display for ContainerSealedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.attempted {
            Some(key) => write!(
                f,
                "Container is sealed and cannot accept new registrations (attempted: {key})"
            )?,
            None => write!(f, "Container is already sealed")?,
        }
        write!(f, "\n  Hint: Register every type before calling .seal()")
    }
}

/// Error when a type can be neither found nor constructed.
#[derive(Debug)]
pub struct UnconstructableTypeError {
    /// The type that was requested
    pub requested: TypeKey,
    /// What required this type (if known)
    pub required_by: Option<TypeKey>,
    /// Registered types with similar names
    pub suggestions: Vec<String>,
}

impl fmt::Display for UnconstructableTypeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Cannot construct type: {}", self.requested)?;

        if let Some(parent) = self.required_by {
            write!(f, "\n  Required by: {parent}")?;
        }

        if !self.suggestions.is_empty() {
            write!(f, "\n  Did you mean one of:")?;
            for suggestion in &self.suggestions {
                write!(f, "\n    - {suggestion}")?;
            }
        }

        write!(
            f,
            "\n  Hint: Register a factory, an instance or a lifetime manager for {}",
            self.requested.short_name()
        )
    }
}

/// Error when a resolution-context value was not supplied.
#[derive(Debug)]
pub struct MissingContextValueError {
    pub key: TypeKey,
    pub required_by: Option<TypeKey>,
}

impl fmt::Display for MissingContextValueError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "No resolution-context value supplied for {}", self.key)?;
        if let Some(parent) = self.required_by {
            write!(f, "\n  Required by: {parent}")?;
        }
        write!(
            f,
            "\n  Hint: Pass a value for {} through ContextValues when resolving",
            self.key.short_name()
        )
    }
}

/// Error when a circular dependency is detected.
///
/// Shows the full chain so the cycle can be located.
#[derive(Debug)]
pub struct CircularDependencyError {
    /// The chain of types that forms the cycle.
    /// Example: [A, B, C, A]
    pub chain: Vec<TypeKey>,
}

impl fmt::Display for CircularDependencyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<String> = self.chain.iter().map(TypeKey::short_name).collect();
        write!(f, "Circular dependency detected:\n  {}", render_chain(&names))?;
        write!(
            f,
            "\n  Hint: A type cannot depend on itself; break the cycle with a factory or an instance"
        )
    }
}

/// Error when a type already has an explicit registration.
#[derive(Debug)]
pub struct AlreadyRegisteredError {
    pub key: TypeKey,
}

impl fmt::Display for AlreadyRegisteredError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Type already registered: {}", self.key)?;
        write!(
            f,
            "\n  Hint: Enable allow_override in ContainerSettings to replace registrations"
        )
    }
}

/// Convenient Result type for quickwire operations.
pub type Result<T> = std::result::Result<T, QuickwireError>;
