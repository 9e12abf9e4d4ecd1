// kernel/src/process/mod.rs
//
// Procesos: ocho slots fijos, sin heap. Cada slot tiene su PCB en una
// arena indexada por número de slot, su pila de kernel de 8 KiB debajo de
// los 8 MiB y su frame físico de 4 MiB para la ventana de usuario.

use core::fmt;

use crate::config::{
    ARGS_MAX, KERNEL_REGION_END, KERNEL_STACK_SIZE, LARGE_PAGE_SIZE, MAX_PROCESSES,
    PROCESS_FRAME_BASE,
};
use crate::fs::FileName;
use crate::terminal::TerminalId;

pub mod context;
pub mod file;
pub mod lifecycle;
pub mod loader;
pub mod scheduler;
pub mod syscall;
pub mod table;

#[cfg(all(target_arch = "x86", target_os = "none"))]
pub mod switch;
#[cfg(all(target_arch = "x86", target_os = "none"))]
pub mod tss;

pub use context::{Context, Launch, SaveTo, Transfer};
pub use file::{FdEntry, FileError, FileKind, FileResult, FileTable};
pub use lifecycle::ExecError;
pub use table::ProcessTable;

// ============================================================================
// Slot
// ============================================================================

/// Número de proceso: índice del PCB, de la pila de kernel y del marco de usuario.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Slot(u8);

impl Slot {
    pub const fn new(index: usize) -> Option<Slot> {
        if index < MAX_PROCESSES {
            Some(Slot(index as u8))
        } else {
            None
        }
    }

    pub const fn index(self) -> usize {
        self.0 as usize
    }

    /// Dirección del bloque de control: la base de los 8 KiB de pila de kernel del slot.
    pub const fn pcb_address(self) -> u32 {
        KERNEL_REGION_END - KERNEL_STACK_SIZE * (self.0 as u32 + 1)
    }

    /// esp0 inicial de este slot.
    pub const fn kernel_stack_top(self) -> u32 {
        KERNEL_REGION_END - 4 - KERNEL_STACK_SIZE * self.0 as u32
    }

    /// Marco físico de 4 MiB mapeado en la ventana del proceso.
    pub const fn frame(self) -> u32 {
        PROCESS_FRAME_BASE + LARGE_PAGE_SIZE * self.0 as u32
    }

    pub fn all() -> impl Iterator<Item = Slot> {
        (0..MAX_PROCESSES as u8).map(Slot)
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

// ============================================================================
// Process Control Block
// ============================================================================

pub struct Pcb {
    /// Tiene la CPU de su terminal; sólo la hoja de cada cadena está activa.
    pub active: bool,
    /// Punto de suspensión que usa el planificador.
    pub context: Context,
    /// Dónde espera el `execute` del padre a que este proceso haga halt.
    pub return_context: Context,
    pub parent: Option<Slot>,
    pub terminal: TerminalId,
    pub files: FileTable,
    pub name: FileName,
    args: [u8; ARGS_MAX],
    args_len: usize,
}

impl Pcb {
    pub const fn vacant() -> Self {
        Self {
            active: false,
            context: Context::empty(),
            return_context: Context::empty(),
            parent: None,
            terminal: TerminalId::FIRST,
            files: FileTable::new(),
            name: FileName::EMPTY,
            args: [0; ARGS_MAX],
            args_len: 0,
        }
    }

    /// Argumentos guardados por `execute`; truncados para caber con un NUL.
    pub fn set_args(&mut self, args: &[u8]) {
        let len = args.len().min(ARGS_MAX - 1);
        self.args[..len].copy_from_slice(&args[..len]);
        self.args_len = len;
    }

    pub fn args(&self) -> &[u8] {
        &self.args[..self.args_len]
    }
}

impl fmt::Debug for Pcb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pcb")
            .field("name", &self.name)
            .field("active", &self.active)
            .field("parent", &self.parent)
            .field("terminal", &self.terminal)
            .finish()
    }
}
