// kernel/src/interrupts/mod.rs
//
// Vectores que maneja el kernel y el camino de excepciones fatales.
// La IDT, el PIC y los stubs de entrada sólo existen en bare metal.

pub mod exception;

#[cfg(all(target_arch = "x86", target_os = "none"))]
pub mod entry;
#[cfg(all(target_arch = "x86", target_os = "none"))]
pub mod idt;
#[cfg(all(target_arch = "x86", target_os = "none"))]
pub mod pic;

pub use exception::exception_name;

/// Número de vectores de excepción de CPU con handler (0..=19).
pub const EXCEPTION_VECTORS: u8 = 20;
pub const TIMER_VECTOR: u8 = 32;
pub const KEYBOARD_VECTOR: u8 = 33;
pub const RTC_VECTOR: u8 = 40;
pub const SYSCALL_VECTOR: u8 = 0x80;
