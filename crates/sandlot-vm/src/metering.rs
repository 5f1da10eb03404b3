//! Instruction metering.
//!
//! The counter lives inside the execution context and is never handed to
//! contract code by value or by mutable reference. Instrumented code reaches
//! it only through [`MeterHook`], which can add units and nothing else.

use serde::{Deserialize, Serialize};

use crate::error::VmError;

/// Fixed surcharges added when contract code crosses into the host.
///
/// Per-statement weights belong to the instrumentation pass; these only
/// cover the cost of a native round-trip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GasSchedule {
    // Storage bridge
    pub storage_read: u64,   // 100
    pub storage_write: u64,  // 200
    pub storage_delete: u64, // 100

    // Blockchain bridge
    pub blockchain_query: u64, // 100
    pub transfer: u64,         // 2_000

    // Calls & modules
    pub inner_call: u64, // 1_000
    pub require: u64,    // 50

    // Console
    pub log: u64, // 10
}

impl Default for GasSchedule {
    fn default() -> Self {
        Self {
            storage_read: 100,
            storage_write: 200,
            storage_delete: 100,

            blockchain_query: 100,
            transfer: 2_000,

            inner_call: 1_000,
            require: 50,

            log: 10,
        }
    }
}

/// Non-decreasing instruction count for one execution context.
///
/// Once the limit is hit the counter stays exhausted: every later charge
/// fails, so a caller that swallows the first error cannot keep running.
#[derive(Debug)]
pub struct InstructionCounter {
    count: u64,
    limit: u64,
    exhausted: bool,
}

impl InstructionCounter {
    pub(crate) fn new(limit: u64) -> Self {
        Self {
            count: 0,
            limit,
            exhausted: false,
        }
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn limit(&self) -> u64 {
        self.limit
    }

    pub fn remaining(&self) -> u64 {
        self.limit - self.count
    }

    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    pub(crate) fn charge(&mut self, units: u64) -> Result<(), VmError> {
        if self.exhausted {
            return Err(VmError::OutOfGas {
                used: self.count,
                limit: self.limit,
            });
        }

        let attempted = self.count.saturating_add(units);
        if attempted > self.limit {
            self.count = self.limit;
            self.exhausted = true;
            return Err(VmError::OutOfGas {
                used: attempted,
                limit: self.limit,
            });
        }

        self.count = attempted;
        Ok(())
    }
}

/// Host-injected metering hook used by instrumented contract code.
///
/// It borrows the counter for its own lifetime and exposes only `incr`;
/// there is no way to read back a `&mut InstructionCounter`, replace the
/// counter, or lower its value through it.
pub struct MeterHook<'a> {
    counter: &'a mut InstructionCounter,
    fatal: &'a mut Option<VmError>,
}

impl<'a> MeterHook<'a> {
    pub(crate) fn new(counter: &'a mut InstructionCounter, fatal: &'a mut Option<VmError>) -> Self {
        Self { counter, fatal }
    }

    /// Add `units` for a statement, loop iteration or call.
    pub fn incr(&mut self, units: u64) -> Result<(), VmError> {
        self.counter.charge(units).map_err(|err| self.latch(err))
    }

    pub fn count(&self) -> u64 {
        self.counter.count()
    }

    /// Record `err` in the context if it is the first fatal one.
    pub(crate) fn latch(&mut self, err: VmError) -> VmError {
        if err.is_fatal() && self.fatal.is_none() {
            tracing::warn!("Fatal error latched: {}", err);
            *self.fatal = Some(err.clone());
        }
        err
    }

    /// A shorter-lived hook over the same counter and latch.
    pub(crate) fn reborrow(&mut self) -> MeterHook<'_> {
        MeterHook {
            counter: &mut *self.counter,
            fatal: &mut *self.fatal,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_counter_charges() {
        let mut counter = InstructionCounter::new(100);
        counter.charge(40).unwrap();
        assert_eq!(counter.count(), 40);
        assert_eq!(counter.remaining(), 60);
    }

    #[test]
    fn test_counter_exact_limit_is_allowed() {
        let mut counter = InstructionCounter::new(100);
        counter.charge(100).unwrap();
        assert!(!counter.is_exhausted());
        assert!(counter.charge(1).is_err());
    }

    #[test]
    fn test_counter_exhaustion_is_sticky() {
        let mut counter = InstructionCounter::new(10);
        let err = counter.charge(11).unwrap_err();
        assert_eq!(err, VmError::OutOfGas { used: 11, limit: 10 });
        assert!(counter.is_exhausted());
        assert_eq!(counter.count(), 10);

        // Even a zero charge fails once exhausted.
        assert!(matches!(counter.charge(0), Err(VmError::OutOfGas { .. })));
    }

    #[test]
    fn test_counter_overflow_saturates() {
        let mut counter = InstructionCounter::new(u64::MAX - 1);
        counter.charge(5).unwrap();
        assert!(counter.charge(u64::MAX).is_err());
        assert_eq!(counter.count(), u64::MAX - 1);
    }

    #[test]
    fn test_hook_latches_fatal() {
        let mut counter = InstructionCounter::new(5);
        let mut fatal = None;
        let mut hook = MeterHook::new(&mut counter, &mut fatal);
        hook.incr(3).unwrap();
        assert_eq!(hook.count(), 3);
        assert!(hook.incr(3).is_err());
        assert!(matches!(fatal, Some(VmError::OutOfGas { .. })));
    }

    #[test]
    fn test_hook_keeps_first_fatal() {
        let mut counter = InstructionCounter::new(5);
        let mut fatal = None;
        let mut hook = MeterHook::new(&mut counter, &mut fatal);
        hook.latch(VmError::CircularRequire("a".into()));
        hook.latch(VmError::ForbiddenModulePath {
            id: "../a".into(),
            reason: "parent directory segment",
        });
        let _ = hook.reborrow().incr(10);
        assert!(matches!(fatal, Some(VmError::ForbiddenModulePath { .. })));
    }

    #[test]
    fn test_default_schedule() {
        let schedule = GasSchedule::default();
        assert!(schedule.transfer > schedule.storage_read);
        assert_eq!(schedule.inner_call, 1_000);
    }

    proptest! {
        #[test]
        fn counter_never_decreases(charges in proptest::collection::vec(0u64..1_000, 0..64)) {
            let mut counter = InstructionCounter::new(20_000);
            let mut last = counter.count();
            for units in charges {
                let _ = counter.charge(units);
                prop_assert!(counter.count() >= last);
                prop_assert!(counter.count() <= counter.limit());
                last = counter.count();
            }
        }
    }
}
