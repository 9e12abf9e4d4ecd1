// kernel/src/process/scheduler.rs

use super::{ProcessTable, Slot, Transfer};
use crate::config::MAX_PROCESSES;
use crate::fs::FileSystem;
use crate::kernel::Kernel;
use crate::machine::Machine;

/// Round robin sobre los 8 slots.
pub struct Scheduler {
    cursor: usize,
}

impl Scheduler {
    /// El primer tick mira el slot 0.
    pub const fn new() -> Self {
        Self {
            cursor: MAX_PROCESSES - 1,
        }
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Avanza el cursor al siguiente slot asignado y activo.
    /// Se rinde tras una vuelta completa.
    pub fn next(&mut self, table: &ProcessTable) -> Option<Slot> {
        for _ in 0..MAX_PROCESSES {
            self.cursor = (self.cursor + 1) % MAX_PROCESSES;
            let slot = Slot::new(self.cursor)?;
            if table.is_runnable(slot) {
                return Some(slot);
            }
        }
        None
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl<F: FileSystem, M: Machine> Kernel<F, M> {
    /// Tick del timer: elige el siguiente slot ejecutable y cambia a él
    /// salvo que ya esté en marcha.
    pub fn timer_tick(&mut self) -> Option<Transfer> {
        let target = self.scheduler.next(&self.procs)?;
        if self.procs.current() == Some(target) {
            return None;
        }
        Some(self.switch_to(target))
    }
}
