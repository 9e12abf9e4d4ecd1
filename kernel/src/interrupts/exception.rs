// kernel/src/interrupts/exception.rs
//
// Excepciones de CPU dentro de un proceso: se imprime el nombre en su
// terminal y el proceso termina con estado 256, como un halt.

use core::fmt::Write;

use log::error;

use crate::config::EXCEPTION_STATUS;
use crate::fs::FileSystem;
use crate::kernel::Kernel;
use crate::machine::Machine;
use crate::process::Transfer;

const NAMES: [&str; 20] = [
    "Divide Error",
    "Debug",
    "NMI Interrupt",
    "Breakpoint",
    "Overflow",
    "BOUND Range Exceeded",
    "Invalid Opcode",
    "Device Not Available",
    "Double Fault",
    "Coprocessor Segment Overrun",
    "Invalid TSS",
    "Segment Not Present",
    "Stack-Segment Fault",
    "General Protection",
    "Page Fault",
    "Reserved",
    "x87 FPU Floating-Point Error",
    "Alignment Check",
    "Machine Check",
    "SIMD Floating-Point Exception",
];

pub fn exception_name(vector: u8) -> &'static str {
    NAMES.get(vector as usize).copied().unwrap_or("Unknown Exception")
}

impl<F: FileSystem, M: Machine> Kernel<F, M> {
    /// Mata al proceso actual tras la excepción de CPU `vector`.
    ///
    /// `None` indica que no había proceso en marcha: el fallo ocurrió en el
    /// propio kernel.
    pub fn exception(&mut self, vector: u8) -> Option<Transfer> {
        let slot = self.procs.current()?;
        let name = exception_name(vector);
        let terminal = self.procs.pcb(slot).terminal;
        error!("exception: {} (vector {}) in {}", name, vector, slot);

        let screen = self.sessions.terminal_mut(terminal);
        let _ = write!(screen, "\nException: {} (vector {})\n", name, vector);
        self.sessions.flush(terminal, &mut self.machine);

        self.halt(EXCEPTION_STATUS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_follow_the_vector_table() {
        assert_eq!(exception_name(0), "Divide Error");
        assert_eq!(exception_name(13), "General Protection");
        assert_eq!(exception_name(14), "Page Fault");
        assert_eq!(exception_name(19), "SIMD Floating-Point Exception");
        assert_eq!(exception_name(20), "Unknown Exception");
    }
}
