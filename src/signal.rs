//! Error signal: a single live recovery point and the value that returns to it.
//!
//! Raising does not jump. [`ErrorSignal::raise`] hands back a [`Raised`]
//! value which the failing code returns with `?`; every frame between the
//! failure and the recovery point unwinds normally and drops its locals.
//! Whoever registered the live point absorbs the value and inspects the
//! harness to learn what failed.

use thiserror::Error;

/// Identity of one registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RecoveryPoint(u64);

/// Marker carried from a failure back to the live recovery point.
#[must_use = "a raised signal has to be returned to its recovery point"]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("control raised to the recovery point")]
pub struct Raised {
    target: Option<RecoveryPoint>,
}

impl Raised {
    /// Recovery point that was live when the signal was raised.
    ///
    /// `None` for signals produced by abandoning a test outright.
    pub fn target(&self) -> Option<RecoveryPoint> {
        self.target
    }

    pub(crate) fn abandoned() -> Self {
        Self { target: None }
    }
}

/// Panic payload for a raise with no recovery point registered.
///
/// Recovery scopes let this payload continue unwinding instead of
/// recording it as a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("error signal raised with no recovery point registered")]
pub struct MissingRecoveryPoint;

/// Result of code that may raise.
pub type Outcome<T = ()> = Result<T, Raised>;

/// Holder of the live recovery point.
#[derive(Debug, Default)]
pub struct ErrorSignal {
    live: Option<RecoveryPoint>,
    next_id: u64,
}

impl ErrorSignal {
    /// Create a signal with no recovery point registered.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make a fresh recovery point live, returning the one it replaced.
    pub fn register_recovery_point(&mut self) -> Option<RecoveryPoint> {
        self.next_id += 1;
        self.live.replace(RecoveryPoint(self.next_id))
    }

    /// Put a previously replaced point back in place.
    pub fn reinstate(&mut self, previous: Option<RecoveryPoint>) {
        self.live = previous;
    }

    /// Drop the live registration.
    pub fn clear(&mut self) {
        self.live = None;
    }

    /// Currently live recovery point, if any.
    pub fn live(&self) -> Option<RecoveryPoint> {
        self.live
    }

    /// Raise to the live recovery point.
    ///
    /// # Panics
    /// Panics with a [`MissingRecoveryPoint`] payload when no recovery point
    /// is registered. Raising without one is a precondition violation and
    /// there is nowhere to resume.
    pub fn raise(&self) -> Raised {
        match self.live {
            Some(point) => Raised {
                target: Some(point),
            },
            None => {
                tracing::error!("{}", MissingRecoveryPoint);
                std::panic::panic_any(MissingRecoveryPoint);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raise_targets_live_point() {
        let mut signal = ErrorSignal::new();
        assert_eq!(signal.register_recovery_point(), None);
        let live = signal.live();
        assert_eq!(signal.raise().target(), live);
    }

    #[test]
    fn register_replaces_previous() {
        let mut signal = ErrorSignal::new();
        signal.register_recovery_point();
        let outer = signal.live();
        let replaced = signal.register_recovery_point();
        assert_eq!(replaced, outer);
        assert_ne!(signal.live(), outer);

        signal.reinstate(replaced);
        assert_eq!(signal.raise().target(), outer);
    }

    #[test]
    fn raised_value_propagates_through_frames() {
        fn inner(signal: &ErrorSignal, dropped: &mut bool) -> Outcome<u32> {
            struct Guard<'a>(&'a mut bool);
            impl Drop for Guard<'_> {
                fn drop(&mut self) {
                    *self.0 = true;
                }
            }
            let _guard = Guard(dropped);
            Err(signal.raise())
        }
        fn outer(signal: &ErrorSignal, dropped: &mut bool) -> Outcome<u32> {
            let value = inner(signal, dropped)?;
            Ok(value + 1)
        }

        let mut signal = ErrorSignal::new();
        signal.register_recovery_point();
        let mut dropped = false;
        assert!(outer(&signal, &mut dropped).is_err());
        assert!(dropped);
    }

    #[test]
    fn raise_without_point_is_fatal() {
        let signal = ErrorSignal::new();
        let payload = std::panic::catch_unwind(|| {
            let _ = signal.raise();
        })
        .unwrap_err();
        assert!(payload.is::<MissingRecoveryPoint>());
    }

    #[test]
    #[should_panic]
    fn raise_after_clear_is_fatal() {
        let mut signal = ErrorSignal::new();
        signal.register_recovery_point();
        signal.clear();
        let _ = signal.raise();
    }
}
