// kernel/src/memory/mod.rs

use crate::config::{USER_WINDOW_BASE, USER_WINDOW_END};

pub mod address_space;
pub mod paging;

pub use address_space::AddressSpace;
pub use paging::{Entry, EntryFlags, PageDirectory, PageTable};

/// Cierto si `[addr, addr + len)` cae dentro de la ventana de 4 MiB del proceso.
/// Un puntero nulo nunca es válido, ni siquiera con rango vacío.
pub fn user_window_contains(addr: u32, len: u32) -> bool {
    if addr == 0 || addr < USER_WINDOW_BASE {
        return false;
    }
    match addr.checked_add(len) {
        Some(end) => end <= USER_WINDOW_END,
        None => false,
    }
}
