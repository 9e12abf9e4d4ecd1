// kernel/src/interrupts/pic.rs
//
// Par de 8259 remapeado a los vectores 32..47.

use x86::io::{inb, outb};

// Comandos del PIC
const CMD_INIT: u8 = 0x11;
const CMD_END_OF_INTERRUPT: u8 = 0x20;

// Puertos del PIC
const PIC1_COMMAND: u16 = 0x20;
const PIC1_DATA: u16 = 0x21;
const PIC2_COMMAND: u16 = 0xA0;
const PIC2_DATA: u16 = 0xA1;

// Offsets de los vectores de interrupción
pub const PIC1_OFFSET: u8 = 32;
pub const PIC2_OFFSET: u8 = PIC1_OFFSET + 8;

/// Línea del esclavo en el maestro.
const CASCADE_LINE: u8 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Irq {
    Timer = PIC1_OFFSET,
    Keyboard = PIC1_OFFSET + 1,
    Rtc = PIC2_OFFSET,
}

impl Irq {
    pub fn vector(self) -> u8 {
        self as u8
    }

    /// Número de línea 0..=15.
    pub fn line(self) -> u8 {
        self as u8 - PIC1_OFFSET
    }
}

/// Inicializa los PICs con todas las líneas enmascaradas salvo la cascada.
pub fn initialize() {
    unsafe {
        // ICW1: Iniciar la secuencia de inicialización
        outb(PIC1_COMMAND, CMD_INIT);
        outb(PIC2_COMMAND, CMD_INIT);

        // ICW2: Offsets de los vectores
        outb(PIC1_DATA, PIC1_OFFSET);
        outb(PIC2_DATA, PIC2_OFFSET);

        // ICW3: Configuración maestro-esclavo
        outb(PIC1_DATA, 1 << CASCADE_LINE);
        outb(PIC2_DATA, CASCADE_LINE);

        // ICW4: Modo 8086
        outb(PIC1_DATA, 1);
        outb(PIC2_DATA, 1);

        outb(PIC1_DATA, !(1 << CASCADE_LINE));
        outb(PIC2_DATA, 0xFF);
    }
}

/// Envía la señal de fin de interrupción (EOI)
pub fn end_of_interrupt(irq: Irq) {
    unsafe {
        if irq.vector() >= PIC2_OFFSET {
            outb(PIC2_COMMAND, CMD_END_OF_INTERRUPT);
        }
        outb(PIC1_COMMAND, CMD_END_OF_INTERRUPT);
    }
}

/// Habilita una línea de IRQ
pub fn enable_irq(irq: Irq) {
    let line = irq.line();
    let (port, bit) = if line < 8 { (PIC1_DATA, line) } else { (PIC2_DATA, line - 8) };
    unsafe {
        let mask = inb(port);
        outb(port, mask & !(1 << bit));
    }
}
