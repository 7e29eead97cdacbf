//! Processor lifecycle state machine.
//!
//! Separate from the per-instruction micro-op queue: this tracks whether the
//! processor is running at all, distinct from what it is doing while running.

use thiserror::Error;

/// The processor's run state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessorState {
    /// Not clocked. `tick()` is rejected; only `enable()` has any effect.
    Disabled,
    /// Reset sequence in progress: loading PC from the reset vector.
    Resetting,
    /// Normal fetch/decode/execute.
    Running,
    /// Parked by `WAI`; wakes on NMI or an asserted IRQ line.
    Waiting,
    /// Parked by `STP`; only a reset can leave this state.
    Stopped,
    /// An external agent (DMA) holds the bus; the core is idle.
    BusAcquired,
}

/// An event applied to the processor's lifecycle state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    /// Enable the processor, optionally starting a reset sequence.
    Enable {
        /// Whether to immediately transition into `Resetting`.
        with_reset: bool,
    },
    /// Stop clocking the processor entirely.
    Disable,
    /// Assert the reset line.
    AssertReset,
    /// Advance one bus cycle.
    Tick,
    /// `WAI` executed.
    Wai,
    /// `STP` executed.
    Stp,
    /// An external agent requests the bus.
    BusRequest,
    /// The external agent releases the bus.
    BusRelease,
}

/// An event was applied to a state that does not accept it.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("event {event:?} is not valid in state {state:?}")]
pub struct InvalidTransition {
    /// The event that was rejected.
    pub event: Event,
    /// The state it was rejected in.
    pub state: ProcessorState,
}

impl ProcessorState {
    /// Apply `event`, returning the resulting state or an error if `event`
    /// is not valid from the current state.
    ///
    /// This only governs the lifecycle transition itself; the side effects
    /// of a transition (loading reset defaults, pushing an interrupt frame)
    /// are the caller's responsibility, not this function's.
    pub fn apply(self, event: Event) -> Result<Self, InvalidTransition> {
        use ProcessorState::{BusAcquired, Disabled, Resetting, Running, Stopped, Waiting};

        let reject = || Err(InvalidTransition { event, state: self });

        match (self, event) {
            (Disabled, Event::Enable { with_reset: true }) => Ok(Resetting),
            (Disabled, Event::Enable { with_reset: false }) => Ok(Running),
            (_, Event::AssertReset) => Ok(Resetting),
            (Disabled, _) => reject(),

            (BusAcquired, Event::Disable) => reject(),
            (Waiting, Event::Disable) => reject(),
            (_, Event::Disable) => Ok(Disabled),

            (Resetting, Event::Tick) => Ok(Resetting),
            (Running, Event::Tick) => Ok(Running),
            (Waiting, Event::Tick) => Ok(Waiting),
            (Stopped, Event::Tick) => Ok(Stopped),
            (BusAcquired, Event::Tick) => Ok(BusAcquired),

            (Running, Event::Wai) => Ok(Waiting),
            (Running, Event::Stp) => Ok(Stopped),
            (_, Event::Wai | Event::Stp) => reject(),

            (Running, Event::BusRequest) => Ok(BusAcquired),
            (BusAcquired, Event::BusRelease) => Ok(Running),
            (_, Event::BusRequest | Event::BusRelease) => reject(),
        }
    }
}
