// kernel/src/serial.rs
//
// Dos escritores para COM1 (0x3F8):
//
//   1. `Serial`: tras un Mutex, lo usan serial_print!/serial_println!
//      y el logger. No sirve en excepciones ni en pánicos, que pueden
//      haber interrumpido a quien tenía el lock.
//
//   2. `RawSerialWriter`: sin lock. Lo usan serial_print_raw! y el
//      panic handler. Salidas concurrentes pueden mezclarse byte a byte.

use core::fmt;

use spin::Mutex;

use x86::io::{inb, outb};

const COM1: u16 = 0x3F8;
const LINE_STATUS: u16 = COM1 + 5;
const TRANSMIT_EMPTY: u8 = 1 << 5;

// ============================================================================
// Locked writer (general use)
// ============================================================================

static SERIAL: Mutex<Serial> = Mutex::new(Serial);

struct Serial;

impl fmt::Write for Serial {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        for byte in s.bytes() {
            write_byte(byte);
        }
        Ok(())
    }
}

/// 38400 baudios, 8N1 y FIFO activo.
pub fn init() {
    unsafe {
        outb(COM1 + 1, 0x00); // sin interrupciones
        outb(COM1 + 3, 0x80); // DLAB
        outb(COM1, 0x03); // divisor 3 -> 38400
        outb(COM1 + 1, 0x00);
        outb(COM1 + 3, 0x03); // 8N1
        outb(COM1 + 2, 0xC7); // FIFO
        outb(COM1 + 4, 0x0B);
    }
}

fn write_byte(byte: u8) {
    unsafe {
        while inb(LINE_STATUS) & TRANSMIT_EMPTY == 0 {}
        outb(COM1, byte);
    }
}

#[doc(hidden)]
pub fn _print(args: fmt::Arguments) {
    use fmt::Write;
    let _ = SERIAL.lock().write_fmt(args);
}

#[macro_export]
macro_rules! serial_print {
    ($($arg:tt)*) => {
        $crate::serial::_print(format_args!($($arg)*))
    };
}

#[macro_export]
macro_rules! serial_println {
    () => ($crate::serial_print!("\n"));
    ($($arg:tt)*) => ($crate::serial_print!("{}\n", format_args!($($arg)*)));
}

// ============================================================================
// Lock-free writer (exceptions, panic)
// ============================================================================

pub struct RawSerialWriter;

impl fmt::Write for RawSerialWriter {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        for byte in s.bytes() {
            write_byte(byte);
        }
        Ok(())
    }
}

#[macro_export]
macro_rules! serial_print_raw {
    ($($arg:tt)*) => {{
        use core::fmt::Write;
        let _ = write!($crate::serial::RawSerialWriter, $($arg)*);
    }};
}

#[macro_export]
macro_rules! serial_println_raw {
    () => ($crate::serial_print_raw!("\n"));
    ($($arg:tt)*) => {{
        use core::fmt::Write;
        let _ = writeln!($crate::serial::RawSerialWriter, $($arg)*);
    }};
}
