//! Stage outcomes.

use crate::error::WorkerError;

/// What a pipeline stage hands to the orchestrator.
#[derive(Debug)]
pub enum StageOutcome<T> {
    /// The stage produced real data
    Ok(T),
    /// The stage fell back to placeholder data; the run continues
    Degraded { value: T, reason: String },
    /// The run cannot continue
    Fatal(WorkerError),
}

impl<T> StageOutcome<T> {
    pub fn degraded(value: T, reason: impl Into<String>) -> Self {
        Self::Degraded {
            value,
            reason: reason.into(),
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, Self::Degraded { .. })
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> StageOutcome<U> {
        match self {
            Self::Ok(value) => StageOutcome::Ok(f(value)),
            Self::Degraded { value, reason } => StageOutcome::Degraded {
                value: f(value),
                reason,
            },
            Self::Fatal(e) => StageOutcome::Fatal(e),
        }
    }
}

#[cfg(test)]
impl<T> StageOutcome<T> {
    pub(crate) fn is_ok(&self) -> bool {
        matches!(self, Self::Ok(_))
    }

    /// The carried value, discarding the degradation reason.
    pub(crate) fn into_value(self) -> Result<T, WorkerError> {
        match self {
            Self::Ok(value) | Self::Degraded { value, .. } => Ok(value),
            Self::Fatal(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_degraded_keeps_value() {
        let outcome = StageOutcome::degraded(String::new(), "speech backend down");
        assert!(outcome.is_degraded());
        assert_eq!(outcome.map(|s| s.len()).into_value().unwrap(), 0);
    }

    #[test]
    fn test_fatal_has_no_value() {
        let outcome: StageOutcome<()> = StageOutcome::Fatal(WorkerError::fatal("disk"));
        assert!(outcome.into_value().is_err());
    }
}
