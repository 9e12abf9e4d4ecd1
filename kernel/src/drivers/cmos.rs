// kernel/src/drivers/cmos.rs
//
// Programación del RTC del chip CMOS (MC146818): interrupción periódica
// en IRQ8 con rate configurable.

use x86::io::{inb, outb};

use super::rtc::DEFAULT_RATE;

const CMOS_INDEX: u16 = 0x70;
const CMOS_DATA: u16 = 0x71;

// Bit 7 del índice deshabilita NMI mientras se accede
const REG_A: u8 = 0x8A;
const REG_B: u8 = 0x8B;
const REG_C: u8 = 0x0C;

const PERIODIC_ENABLE: u8 = 0x40;

unsafe fn read(register: u8) -> u8 {
    outb(CMOS_INDEX, register);
    inb(CMOS_DATA)
}

unsafe fn write(register: u8, value: u8) {
    outb(CMOS_INDEX, register);
    outb(CMOS_DATA, value);
}

/// Habilita la interrupción periódica a los 2 Hz por defecto.
pub fn init() {
    unsafe {
        let previous = read(REG_B);
        write(REG_B, previous | PERIODIC_ENABLE);
    }
    set_rate(DEFAULT_RATE);
}

/// Código de frecuencia 6..=15 (1024 Hz .. 2 Hz).
pub fn set_rate(rate: u8) {
    unsafe {
        let previous = read(REG_A);
        write(REG_A, (previous & 0xF0) | (rate & 0x0F));
    }
}

/// Lee el registro C; sin esto IRQ8 no vuelve a dispararse.
pub fn acknowledge() {
    unsafe {
        read(REG_C);
    }
}
