// kernel/src/memory/paging.rs
//
// Entradas de paginación x86 de 32 bits (sin PAE). Un directorio y una
// tabla tienen el mismo formato: 1024 entradas de 4 bytes alineadas a
// 4 KiB, así que ambos se representan con `PageTable`.

use core::fmt;

use bitflags::bitflags;

pub const ENTRY_COUNT: usize = 1024;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct EntryFlags: u32 {
        const PRESENT       = 1 << 0;
        const WRITABLE      = 1 << 1;
        const USER          = 1 << 2;
        const WRITE_THROUGH = 1 << 3;
        const CACHE_DISABLE = 1 << 4;
        const ACCESSED      = 1 << 5;
        const DIRTY         = 1 << 6;
        /// Página de 4 MiB (sólo en entradas de directorio, necesita CR4.PSE).
        const LARGE         = 1 << 7;
        const GLOBAL        = 1 << 8;
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Default)]
#[repr(transparent)]
pub struct Entry(u32);

impl Entry {
    pub const UNUSED: Entry = Entry(0);

    /// `frame` debe estar alineado a 4 KiB (a 4 MiB con `LARGE`).
    pub const fn new(frame: u32, flags: EntryFlags) -> Self {
        Entry((frame & !0xFFF) | flags.bits())
    }

    pub const fn frame(self) -> u32 {
        self.0 & !0xFFF
    }

    pub const fn flags(self) -> EntryFlags {
        EntryFlags::from_bits_truncate(self.0)
    }

    pub const fn is_present(self) -> bool {
        self.0 & EntryFlags::PRESENT.bits() != 0
    }

    pub const fn raw(self) -> u32 {
        self.0
    }
}

impl fmt::Debug for Entry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Entry({:#010x}, {:?})", self.frame(), self.flags())
    }
}

#[derive(Clone, PartialEq, Eq)]
#[repr(C, align(4096))]
pub struct PageTable {
    entries: [Entry; ENTRY_COUNT],
}

/// El directorio tiene el mismo formato que una tabla.
pub type PageDirectory = PageTable;

impl PageTable {
    pub const fn empty() -> Self {
        Self {
            entries: [Entry::UNUSED; ENTRY_COUNT],
        }
    }

    pub fn entry(&self, index: usize) -> Entry {
        self.entries[index]
    }

    pub fn set(&mut self, index: usize, entry: Entry) {
        self.entries[index] = entry;
    }

    /// Dirección que ve la MMU. La memoria del kernel está mapeada identidad, así
    /// que es la propia dirección de la tabla; sólo tiene sentido cuando la tabla
    /// ya está en su sitio definitivo (estático).
    pub fn physical_address(&self) -> u32 {
        self as *const Self as usize as u32
    }

    pub fn present(&self) -> impl Iterator<Item = (usize, Entry)> + '_ {
        self.entries
            .iter()
            .copied()
            .enumerate()
            .filter(|(_, entry)| entry.is_present())
    }
}

impl fmt::Debug for PageTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.present()).finish()
    }
}

pub const fn directory_index(vaddr: u32) -> usize {
    (vaddr >> 22) as usize
}

pub const fn table_index(vaddr: u32) -> usize {
    ((vaddr >> 12) & 0x3FF) as usize
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entry_packs_frame_and_flags() {
        let entry = Entry::new(0x0080_0000, EntryFlags::PRESENT | EntryFlags::LARGE | EntryFlags::USER);
        assert_eq!(entry.raw(), 0x0080_0085);
        assert_eq!(entry.frame(), 0x0080_0000);
        assert!(entry.is_present());
        assert!(entry.flags().contains(EntryFlags::LARGE));
        assert!(!Entry::UNUSED.is_present());
    }

    #[test]
    fn unaligned_frame_bits_are_dropped() {
        let entry = Entry::new(0xB8123, EntryFlags::PRESENT);
        assert_eq!(entry.frame(), 0xB8000);
    }

    #[test]
    fn indices_split_an_address() {
        assert_eq!(directory_index(0x0804_8000), 32);
        assert_eq!(table_index(0x0804_8000), 0x48);
        assert_eq!(table_index(0xB8000), 0xB8);
    }

    #[test]
    fn present_skips_unused_entries() {
        let mut table = PageTable::empty();
        table.set(3, Entry::new(0x3000, EntryFlags::PRESENT));
        table.set(7, Entry::new(0x7000, EntryFlags::WRITABLE));
        let present: std::vec::Vec<_> = table.present().map(|(i, _)| i).collect();
        assert_eq!(present, [3]);
    }
}
