use crate::Error;
use serde::{Deserialize, Serialize};
use std::error::Error as StdError;
use std::fmt;

/// `FailureKind` classifies the abnormal termination of a wrapped operation.
///
/// The tags are deliberately coarse. Callers that need finer distinctions than
/// the built-in ones can mint their own with `Custom`, the kinds only have to
/// be stable enough to match against the breaker's ignored set.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize, Hash)]
pub enum FailureKind {
    /// The dependency did not answer in time.
    Timeout,
    /// The dependency could not be reached at all.
    Connection,
    /// The dependency answered, but the exchange itself was broken.
    Protocol,
    #[serde(skip)]
    Custom(u8),
}

/// `Failure` is how a wrapped operation reports abnormal termination: the
/// original cause tagged with a [`FailureKind`] so the breaker can match it
/// against the ignored set.
#[derive(Debug)]
pub struct Failure {
    kind: FailureKind,
    cause: Error,
}

impl Failure {
    pub fn new(kind: FailureKind, cause: Error) -> Self {
        Self { kind, cause }
    }

    pub fn msg<M>(kind: FailureKind, msg: M) -> Self
    where
        M: fmt::Display + fmt::Debug + Send + Sync + 'static,
    {
        Self {
            kind,
            cause: Error::msg(msg),
        }
    }

    pub fn kind(&self) -> FailureKind {
        self.kind
    }

    pub fn cause(&self) -> &Error {
        &self.cause
    }

    pub fn into_cause(self) -> Error {
        self.cause
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.cause)
    }
}

impl StdError for Failure {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        Some(self.cause.as_ref())
    }
}

/// `BreakerError` is the outcome of an execute call that did not produce a value.
///
/// Every abnormal outcome surfaces as exactly one of these variants, the breaker
/// never swallows a failure silently.
#[derive(Debug)]
pub enum BreakerError {
    /// The breaker was open, the operation was never invoked.
    Open,
    /// The operation failed and the failure was counted against the breaker.
    Operation(Failure),
    /// The operation failed with a kind in the ignored set. The failure passed
    /// through the breaker untouched: no counter or state change, and both
    /// `Display` and `source` defer to the original failure.
    Ignored(Failure),
}

impl BreakerError {
    pub fn is_open(&self) -> bool {
        matches!(self, BreakerError::Open)
    }

    /// The failure of the wrapped operation, if one was invoked.
    pub fn failure(&self) -> Option<&Failure> {
        match self {
            BreakerError::Open => None,
            BreakerError::Operation(failure) | BreakerError::Ignored(failure) => Some(failure),
        }
    }

    pub fn into_failure(self) -> Option<Failure> {
        match self {
            BreakerError::Open => None,
            BreakerError::Operation(failure) | BreakerError::Ignored(failure) => Some(failure),
        }
    }
}

impl fmt::Display for BreakerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BreakerError::Open => write!(f, "circuit breaker is open"),
            BreakerError::Operation(failure) => {
                write!(f, "wrapped operation failed: {}", failure)
            }
            BreakerError::Ignored(failure) => write!(f, "{}", failure),
        }
    }
}

impl StdError for BreakerError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            BreakerError::Open => None,
            BreakerError::Operation(failure) => Some(failure),
            // transparent, as if the breaker was never there
            BreakerError::Ignored(failure) => failure.source(),
        }
    }
}
