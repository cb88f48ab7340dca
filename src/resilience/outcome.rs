//! Classified result of one remote call attempt.

/// Outcome of a call, tagged by how the resilience layer should treat it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallOutcome<T, E> {
    Success(T),
    /// Transient failure: eligible for retry, counted by the breaker.
    RetryableFailure(E),
    /// Non-retryable failure: ends the retry loop, still counted by the breaker.
    FatalFailure(E),
}

impl<T, E> CallOutcome<T, E> {
    pub fn is_success(&self) -> bool {
        matches!(self, CallOutcome::Success(_))
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, CallOutcome::RetryableFailure(_))
    }

    pub fn is_fatal(&self) -> bool {
        matches!(self, CallOutcome::FatalFailure(_))
    }

    pub fn error(&self) -> Option<&E> {
        match self {
            CallOutcome::Success(_) => None,
            CallOutcome::RetryableFailure(e) | CallOutcome::FatalFailure(e) => Some(e),
        }
    }

    pub fn into_result(self) -> Result<T, E> {
        match self {
            CallOutcome::Success(value) => Ok(value),
            CallOutcome::RetryableFailure(e) | CallOutcome::FatalFailure(e) => Err(e),
        }
    }

    /// Short label for log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            CallOutcome::Success(_) => "success",
            CallOutcome::RetryableFailure(_) => "retryable_failure",
            CallOutcome::FatalFailure(_) => "fatal_failure",
        }
    }
}
