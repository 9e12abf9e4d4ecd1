// kernel/src/drivers/vga.rs
//
// Modo texto 80x25 en 0xB8000: una celda = carácter + atributo.

use core::ptr;

use crate::config::{SCREEN_CELLS, SCREEN_COLS, VIDEO_PHYS};
use x86::io::outb;

const BUFFER: *mut u16 = VIDEO_PHYS as *mut u16;
const ATTRIBUTE: u16 = 0x07;
const PANIC_ATTRIBUTE: u16 = 0x4F;

const CRTC_INDEX: u16 = 0x3D4;
const CRTC_DATA: u16 = 0x3D5;

fn put(offset: usize, byte: u8, attribute: u16) {
    if offset < SCREEN_CELLS {
        unsafe {
            ptr::write_volatile(BUFFER.add(offset), (attribute << 8) | byte as u16);
        }
    }
}

pub fn render(offset: usize, cells: &[u8]) {
    for (i, &byte) in cells.iter().enumerate() {
        put(offset + i, byte, ATTRIBUTE);
    }
}

pub fn move_cursor(offset: usize) {
    let position = offset.min(SCREEN_CELLS - 1) as u16;
    unsafe {
        outb(CRTC_INDEX, 0x0F);
        outb(CRTC_DATA, (position & 0xFF) as u8);
        outb(CRTC_INDEX, 0x0E);
        outb(CRTC_DATA, (position >> 8) as u8);
    }
}

/// Fila superior en rojo que remite al log serie.
pub fn panic_banner() {
    let text = b" KERNEL PANIC - see serial log ";
    for column in 0..SCREEN_COLS {
        let byte = text.get(column).copied().unwrap_or(b' ');
        put(column, byte, PANIC_ATTRIBUTE);
    }
}
