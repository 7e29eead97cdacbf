//! The Host Tick Facade: wires a [`Processor`] to a [`Mapper`] and exposes
//! the single-call tick/reset/interrupt surface a host application drives.
//!
//! Grounded on `rustynes-core::console::Console`: one struct owning both
//! halves of the emulated machine, a `tick()` that forwards to the
//! processor, and thin wrappers over its lifecycle events. `onNewCycle`/
//! `onNewInstruction` generalize `rustynes-cpu::trace::CpuTracer`'s
//! always-on internal `Vec<String>` log to optional, externally supplied
//! callback sinks, so a host that never looks at them pays nothing.

use std::path::Path;
use std::sync::Mutex;

use w65816_cpu::bus::Bus;
use w65816_cpu::cpu::{Cycle, Processor};
use w65816_cpu::{CpuError, ProcessorSnapshot, ProcessorState};

use crate::device::Registry;
use crate::mapper::Mapper;
use crate::save_state::{SaveState, SaveStateError};

/// An operation was attempted while the machine's processor was in a state
/// that does not permit it.
#[derive(Debug, thiserror::Error)]
pub enum MachineError {
    /// The underlying processor lifecycle transition was rejected.
    #[error(transparent)]
    Cpu(#[from] CpuError),

    /// `set_processor_state` was called while the processor was not
    /// `Disabled`.
    #[error("set_processor_state requires the processor to be Disabled, found {0:?}")]
    NotDisabled(ProcessorState),
}

type CycleSink = Box<dyn FnMut(Cycle) + Send>;
type InstructionSink = Box<dyn FnMut(&str) + Send>;

struct Inner {
    processor: Processor,
    mapper: Mapper,
    on_new_cycle: Option<CycleSink>,
    on_new_instruction: Option<InstructionSink>,
}

/// Owns a [`Processor`] and a [`Mapper`] behind a single mutex, matching
/// spec §5's "facade guards all state with a single mutex." One `tick()`
/// call drives the processor through exactly one bus cycle.
pub struct Machine {
    inner: Mutex<Inner>,
}

impl Machine {
    /// A freshly constructed machine with an empty [`Mapper`] and no devices.
    /// Calls `enable(true)` immediately, so the first `tick()` observes the
    /// processor already progressing through `Resetting` — matching
    /// `rustynes-core::Console::new()`'s eager `cpu.reset()`.
    #[must_use]
    pub fn new() -> Self {
        let mut processor = Processor::new();
        let _ = processor.enable(true);
        Machine {
            inner: Mutex::new(Inner {
                processor,
                mapper: Mapper::new(),
                on_new_cycle: None,
                on_new_instruction: None,
            }),
        }
    }

    /// Register `device` at `[bus_start, bus_start + length)` on the
    /// underlying mapper, offset by `dev_offset` into its own address space.
    ///
    /// # Errors
    ///
    /// Returns whatever [`crate::mapper::Mapper::add`] returns.
    pub fn add_device(
        &self,
        guid: impl Into<String>,
        kind: &'static str,
        device: Box<dyn crate::device::Device>,
        bus_start: u32,
        dev_offset: u32,
        length: u32,
    ) -> Result<(), crate::mapper::MapperError> {
        let mut inner = self.inner.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        inner.mapper.add(guid, kind, device, bus_start, dev_offset, length)
    }

    /// Install the callback invoked after every completed bus cycle.
    pub fn on_new_cycle(&self, sink: impl FnMut(Cycle) + Send + 'static) {
        let mut inner = self.inner.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        inner.on_new_cycle = Some(Box::new(sink));
    }

    /// Install the callback invoked at every instruction boundary (when a
    /// `tick()` is about to perform a fetch/decode), with a disassembled
    /// text rendering of the instruction just completed.
    pub fn on_new_instruction(&self, sink: impl FnMut(&str) + Send + 'static) {
        let mut inner = self.inner.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        inner.on_new_instruction = Some(Box::new(sink));
    }

    /// Advance the processor by exactly one bus cycle, firing `on_new_cycle`
    /// (and `on_new_instruction`, if the micro-op queue was empty going in)
    /// as a side effect.
    ///
    /// # Errors
    ///
    /// Returns [`CpuError`] if the processor is `Disabled`.
    pub fn tick(&self) -> Result<Cycle, CpuError> {
        let mut inner = self.inner.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        let at_boundary = inner.processor.queue_is_empty();
        if at_boundary && inner.on_new_instruction.is_some() {
            let text = crate::trace::disassemble_at(&inner.processor, &inner.mapper);
            if let Some(sink) = inner.on_new_instruction.as_mut() {
                sink(&text);
            }
        }
        let cycle = inner.processor.tick(&mut inner.mapper)?;
        if let Some(sink) = inner.on_new_cycle.as_mut() {
            sink(cycle);
        }
        Ok(cycle)
    }

    /// Assert the reset line, re-entering the `Resetting` sequence.
    ///
    /// # Errors
    ///
    /// Returns [`CpuError`] if rejected by the processor's lifecycle state
    /// machine (it is not: reset is valid from every state).
    pub fn reset(&self) -> Result<(), CpuError> {
        let mut inner = self.inner.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        inner.processor.assert_reset()?;
        inner.mapper.reset_devices();
        Ok(())
    }

    /// Latch a pending NMI, serviced at the next instruction boundary.
    pub fn issue_nmi(&self) {
        let mut inner = self.inner.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        inner.processor.issue_nmi();
    }

    /// Assert or release the externally driven IRQ line, OR'd with every
    /// registered device's own `interrupting()` bit.
    pub fn issue_irq(&self, level: bool) {
        let mut inner = self.inner.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        inner.mapper.assert_external_irq(level);
    }

    /// Request the bus for an external agent (DMA). The core idles until
    /// [`Machine::bus_release`].
    ///
    /// # Errors
    ///
    /// Returns [`CpuError`] if the processor is not currently `Running`.
    pub fn bus_request(&self) -> Result<(), CpuError> {
        let mut inner = self.inner.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        inner.processor.bus_request()
    }

    /// Release a previously acquired bus request.
    ///
    /// # Errors
    ///
    /// Returns [`CpuError`] if the processor is not currently `BusAcquired`.
    pub fn bus_release(&self) -> Result<(), CpuError> {
        let mut inner = self.inner.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        inner.processor.bus_release()
    }

    /// The processor's current architectural register state.
    #[must_use]
    pub fn snapshot(&self) -> ProcessorSnapshot {
        let inner = self.inner.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        inner.processor.snapshot()
    }

    /// The processor's current lifecycle state.
    #[must_use]
    pub fn processor_state(&self) -> ProcessorState {
        let inner = self.inner.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        inner.processor.state()
    }

    /// Overwrite the processor's register state wholesale. Only valid while
    /// the processor is `Disabled`, so that loading a snapshot can never
    /// race a mid-instruction `tick()`.
    ///
    /// # Errors
    ///
    /// Returns [`MachineError::NotDisabled`] if the processor is not
    /// currently `Disabled`.
    pub fn set_processor_state(&self, snapshot: ProcessorSnapshot) -> Result<(), MachineError> {
        let mut inner = self.inner.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        let state = inner.processor.state();
        if state != ProcessorState::Disabled {
            return Err(MachineError::NotDisabled(state));
        }
        inner.processor.load_snapshot(snapshot);
        Ok(())
    }

    /// Write a complete save state (registers plus every registered
    /// device's state, plus `.ramdump` sidecars) to `path`.
    ///
    /// # Errors
    ///
    /// Returns [`SaveStateError`] if the file or a sidecar cannot be
    /// written.
    pub fn save_state_to_path(&self, path: impl AsRef<Path>) -> Result<(), SaveStateError> {
        let inner = self.inner.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        let snapshot = inner.processor.snapshot();
        let state = SaveState::capture(snapshot, &inner.mapper);
        state.write_to_path(path, &inner.mapper)
    }

    /// Restore a save state previously written by
    /// [`Machine::save_state_to_path`]. Devices are matched by `guid`
    /// against those already registered with this machine's mapper; use
    /// [`Registry`] to construct devices for a layout not already built.
    ///
    /// # Errors
    ///
    /// Returns [`SaveStateError`] if the file cannot be read or parsed, or
    /// if a device record references a `guid` not currently registered.
    pub fn load_state_from_path(&self, path: impl AsRef<Path>) -> Result<(), SaveStateError> {
        let mut inner = self.inner.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        let state = SaveState::read_from_path(path.as_ref())?;
        state.apply_to(&mut inner.mapper, path.as_ref())?;
        inner.processor.load_snapshot(state.to_snapshot());
        Ok(())
    }

    /// The device-kind registry used to reconstruct devices from save-state
    /// records whose `guid` is not already registered with this machine.
    #[must_use]
    pub fn registry() -> Registry {
        Registry::with_builtins()
    }
}

impl Default for Machine {
    fn default() -> Self {
        Machine::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::Ram;

    #[test]
    fn new_machine_is_resetting() {
        let machine = Machine::new();
        assert_eq!(machine.processor_state(), ProcessorState::Resetting);
    }

    #[test]
    fn tick_advances_the_processor() {
        let machine = Machine::new();
        machine.add_device("ram0", "ram", Box::new(Ram::new(0x1_0000)), 0, 0, 0x1_0000).unwrap();
        let before = machine.snapshot().cycles;
        machine.tick().unwrap();
        assert_eq!(machine.snapshot().cycles, before + 1);
    }

    #[test]
    fn set_processor_state_requires_disabled() {
        let machine = Machine::new();
        let snapshot = machine.snapshot();
        assert!(matches!(
            machine.set_processor_state(snapshot),
            Err(MachineError::NotDisabled(_))
        ));
    }

    #[test]
    fn on_new_cycle_sink_observes_every_tick() {
        let machine = Machine::new();
        machine.add_device("ram0", "ram", Box::new(Ram::new(0x1_0000)), 0, 0, 0x1_0000).unwrap();
        let count = std::sync::Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let counter = count.clone();
        machine.on_new_cycle(move |_cycle| {
            counter.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        });
        machine.tick().unwrap();
        machine.tick().unwrap();
        assert_eq!(count.load(std::sync::atomic::Ordering::SeqCst), 2);
    }

    #[test]
    fn issue_irq_raises_the_mapper_line() {
        let machine = Machine::new();
        machine.issue_irq(true);
        {
            let inner = machine.inner.lock().unwrap();
            assert!(inner.mapper.interrupt_line());
        }
        machine.issue_irq(false);
        let inner = machine.inner.lock().unwrap();
        assert!(!inner.mapper.interrupt_line());
    }
}
