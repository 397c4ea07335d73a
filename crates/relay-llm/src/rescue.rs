//! Exception wrapper around adapter operations

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use crate::error::{ErrorKind, LlmError};

type Handler = Arc<dyn Fn(&LlmError) + Send + Sync>;
type Filter = Arc<dyn Fn(&LlmError) -> bool + Send + Sync>;

/// Result of a wrapped operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome<T> {
    /// The operation succeeded
    Completed(T),
    /// The operation failed and the handler absorbed the error
    Handled,
}

impl<T> Outcome<T> {
    /// The completed value, if any
    pub fn completed(self) -> Option<T> {
        match self {
            Self::Completed(value) => Some(value),
            Self::Handled => None,
        }
    }

    pub const fn is_handled(&self) -> bool {
        matches!(self, Self::Handled)
    }
}

/// Decides which operation errors a handler absorbs
///
/// Validation and configuration errors are caller mistakes and always
/// propagate, whatever the handler or filter say.
#[derive(Clone, Default)]
pub struct Rescue {
    handler: Option<Handler>,
    declines: Option<Filter>,
}

impl fmt::Debug for Rescue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Rescue")
            .field("handler", &self.handler.is_some())
            .field("declines", &self.declines.is_some())
            .finish()
    }
}

impl Rescue {
    /// Wrapper without a handler; every error propagates
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `handler` on absorbed errors; its return value is discarded
    #[must_use]
    pub fn with_handler<F, R>(mut self, handler: F) -> Self
    where
        F: Fn(&LlmError) -> R + Send + Sync + 'static,
    {
        self.handler = Some(Arc::new(move |error| {
            let _ = handler(error);
        }));
        self
    }

    /// Let errors for which `declines` returns true propagate untouched
    #[must_use]
    pub fn declining<F>(mut self, declines: F) -> Self
    where
        F: Fn(&LlmError) -> bool + Send + Sync + 'static,
    {
        self.declines = Some(Arc::new(declines));
        self
    }

    /// Whether `error` would be absorbed
    pub fn absorbs(&self, error: &LlmError) -> bool {
        self.handler.is_some()
            && !matches!(error.kind(), ErrorKind::Validation | ErrorKind::Configuration)
            && !self.declines.as_ref().is_some_and(|declines| declines(error))
    }

    /// Apply the wrapper to a finished operation
    pub fn wrap<T>(&self, result: Result<T, LlmError>) -> Result<Outcome<T>, LlmError> {
        match result {
            Ok(value) => Ok(Outcome::Completed(value)),
            Err(error) => match &self.handler {
                Some(handler) if self.absorbs(&error) => {
                    tracing::warn!(error = %error, kind = ?error.kind(), "operation failed, error handled");
                    handler(&error);
                    Ok(Outcome::Handled)
                }
                _ => Err(error),
            },
        }
    }

    /// Await `operation` and apply the wrapper to its result
    pub async fn run<T, F>(&self, operation: F) -> Result<Outcome<T>, LlmError>
    where
        F: Future<Output = Result<T, LlmError>>,
    {
        self.wrap(operation.await)
    }
}
