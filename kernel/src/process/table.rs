// kernel/src/process/table.rs
//
// Tabla de procesos: bitmask de 8 slots + arena de PCBs. El bitmask es la
// única fuente de verdad sobre qué slot está vivo.

use log::trace;

use super::{Pcb, Slot};
use crate::config::MAX_PROCESSES;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableFull;

pub struct ProcessTable {
    bitmask: u8,
    current: Option<Slot>,
    pcbs: [Pcb; MAX_PROCESSES],
}

impl ProcessTable {
    pub const fn new() -> Self {
        const VACANT: Pcb = Pcb::vacant();
        Self {
            bitmask: 0,
            current: None,
            pcbs: [VACANT; MAX_PROCESSES],
        }
    }

    /// Toma el slot libre más bajo y lo hace actual.
    pub fn allocate(&mut self) -> Result<Slot, TableFull> {
        let slot = Slot::all()
            .find(|slot| !self.is_allocated(*slot))
            .ok_or(TableFull)?;
        self.bitmask |= 1 << slot.index();
        self.current = Some(slot);
        trace!("procs: allocated {} (mask {:#010b})", slot, self.bitmask);
        Ok(slot)
    }

    /// Libera el slot actual; su padre pasa a ser el actual.
    pub fn deallocate(&mut self) -> Option<Slot> {
        let slot = self.current?;
        let parent = self.pcbs[slot.index()].parent;
        self.release(slot);
        self.current = parent;
        Some(slot)
    }

    /// Limpia el bit de `slot` sin tocar el proceso actual.
    pub fn release(&mut self, slot: Slot) {
        self.bitmask &= !(1 << slot.index());
        self.pcbs[slot.index()].active = false;
        trace!("procs: released {} (mask {:#010b})", slot, self.bitmask);
    }

    pub fn is_allocated(&self, slot: Slot) -> bool {
        self.bitmask & (1 << slot.index()) != 0
    }

    pub fn is_full(&self) -> bool {
        self.bitmask.count_ones() as usize == MAX_PROCESSES
    }

    pub fn bitmask(&self) -> u8 {
        self.bitmask
    }

    pub fn count(&self) -> usize {
        self.bitmask.count_ones() as usize
    }

    pub fn current(&self) -> Option<Slot> {
        self.current
    }

    pub fn set_current(&mut self, slot: Option<Slot>) {
        self.current = slot;
    }

    pub fn pcb(&self, slot: Slot) -> &Pcb {
        &self.pcbs[slot.index()]
    }

    pub fn pcb_mut(&mut self, slot: Slot) -> &mut Pcb {
        &mut self.pcbs[slot.index()]
    }

    pub fn current_pcb(&self) -> Option<&Pcb> {
        self.current.map(|slot| self.pcb(slot))
    }

    /// Asignado y activo: lo que el planificador puede elegir.
    pub fn is_runnable(&self, slot: Slot) -> bool {
        self.is_allocated(slot) && self.pcb(slot).active
    }

    pub fn live(&self) -> impl Iterator<Item = Slot> + '_ {
        Slot::all().filter(|slot| self.is_allocated(*slot))
    }
}

impl Default for ProcessTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slot(n: usize) -> Slot {
        Slot::new(n).unwrap()
    }

    #[test]
    fn allocate_takes_lowest_free_slot() {
        let mut table = ProcessTable::new();
        assert_eq!(table.allocate(), Ok(slot(0)));
        assert_eq!(table.allocate(), Ok(slot(1)));
        assert_eq!(table.allocate(), Ok(slot(2)));
        table.release(slot(1));
        assert_eq!(table.allocate(), Ok(slot(1)));
        assert_eq!(table.current(), Some(slot(1)));
        assert_eq!(table.bitmask(), 0b111);
    }

    #[test]
    fn ninth_allocation_saturates() {
        let mut table = ProcessTable::new();
        for n in 0..MAX_PROCESSES {
            assert_eq!(table.allocate(), Ok(slot(n)));
        }
        assert!(table.is_full());
        assert_eq!(table.allocate(), Err(TableFull));
        assert_eq!(table.bitmask(), 0xFF);
        assert_eq!(table.current(), Some(slot(7)));
    }

    #[test]
    fn deallocate_returns_to_parent() {
        let mut table = ProcessTable::new();
        let parent = table.allocate().unwrap();
        let child = table.allocate().unwrap();
        table.pcb_mut(child).parent = Some(parent);

        assert_eq!(table.deallocate(), Some(child));
        assert_eq!(table.current(), Some(parent));
        assert!(!table.is_allocated(child));

        assert_eq!(table.deallocate(), Some(parent));
        assert_eq!(table.current(), None);
        assert_eq!(table.deallocate(), None);
        assert_eq!(table.count(), 0);
    }

    #[test]
    fn runnable_needs_bit_and_active_flag() {
        let mut table = ProcessTable::new();
        let a = table.allocate().unwrap();
        assert!(!table.is_runnable(a));
        table.pcb_mut(a).active = true;
        assert!(table.is_runnable(a));
        table.release(a);
        assert!(!table.is_runnable(a));
        assert_eq!(table.live().count(), 0);
    }
}
