// kernel/src/pit.rs

use x86::io::outb;

// Puertos del PIT
const PIT_CHANNEL_0_DATA: u16 = 0x40;
const PIT_COMMAND: u16 = 0x43;

const PIT_BASE_HZ: u32 = 1_193_182;

/// Canal 0 en modo 2 (rate generator) a `frequency` Hz.
pub fn init(frequency: u32) {
    let divisor = PIT_BASE_HZ / frequency;
    let low = (divisor & 0xFF) as u8;
    let high = ((divisor >> 8) & 0xFF) as u8;

    unsafe {
        outb(PIT_COMMAND, 0x34);
        // low byte, then high byte
        outb(PIT_CHANNEL_0_DATA, low);
        outb(PIT_CHANNEL_0_DATA, high);
    }
}
