// kernel/src/memory/address_space.rs
//
// El único directorio de páginas, compartido por todos los procesos.
// Tras el arranque sólo cambian dos entradas: la ventana del proceso
// (índice 32) y el alias de vídeo de usuario (índice 34). El resto se
// instala una vez.
//
//   PDE 0   -> video_table (páginas de 4 KiB, sólo 0xB8000 presente)
//   PDE 1   -> página de kernel de 4 MiB en 0x400000
//   PDE 32  -> marco de 4 MiB del proceso planificado
//   PDE 34  -> alias_table (una página: vídeo real o página auxiliar)

use log::trace;

use super::paging::{directory_index, table_index, Entry, EntryFlags, PageDirectory, PageTable};
use crate::config::{KERNEL_BASE, USER_WINDOW_BASE, VIDEO_ALIAS_ADDR, VIDEO_PHYS};
use crate::machine::Machine;

pub const WINDOW_SLOT: usize = directory_index(USER_WINDOW_BASE);
pub const ALIAS_SLOT: usize = directory_index(VIDEO_ALIAS_ADDR);

pub struct AddressSpace {
    directory: PageDirectory,
    video_table: PageTable,
    alias_table: PageTable,
}

impl AddressSpace {
    pub const fn new() -> Self {
        Self {
            directory: PageTable::empty(),
            video_table: PageTable::empty(),
            alias_table: PageTable::empty(),
        }
    }

    /// Escribe las entradas fijas del kernel y carga el directorio.
    ///
    /// Debe ejecutarse con el valor ya en su dirección final, porque el
    /// directorio guarda la dirección física de las tablas que contiene.
    pub fn install(&mut self, machine: &mut dyn Machine) {
        self.video_table.set(
            table_index(VIDEO_PHYS),
            Entry::new(VIDEO_PHYS, EntryFlags::PRESENT | EntryFlags::WRITABLE),
        );
        self.directory.set(
            0,
            Entry::new(
                self.video_table.physical_address(),
                EntryFlags::PRESENT | EntryFlags::WRITABLE,
            ),
        );
        self.directory.set(
            directory_index(KERNEL_BASE),
            Entry::new(
                KERNEL_BASE,
                EntryFlags::PRESENT | EntryFlags::WRITABLE | EntryFlags::LARGE | EntryFlags::GLOBAL,
            ),
        );
        machine.load_page_directory(&self.directory);
    }

    /// Apunta la ventana del proceso a `frame` y vacía la TLB.
    /// Las interrupciones deben estar deshabilitadas.
    pub fn remap_process_window(&mut self, frame: u32, machine: &mut dyn Machine) {
        trace!("paging: window -> {:#010x}", frame);
        let flags = EntryFlags::PRESENT | EntryFlags::WRITABLE | EntryFlags::USER | EntryFlags::LARGE;
        self.directory.set(WINDOW_SLOT, Entry::new(frame, flags));
        machine.load_page_directory(&self.directory);
    }

    /// Repone una entrada de ventana guardada con [`window_entry`](Self::window_entry).
    pub fn restore_process_window(&mut self, entry: Entry, machine: &mut dyn Machine) {
        self.directory.set(WINDOW_SLOT, entry);
        machine.load_page_directory(&self.directory);
    }

    /// Apunta el alias de vídeo de usuario a `target` (memoria de vídeo real o
    /// página auxiliar) y vacía la TLB.
    pub fn remap_video_alias(&mut self, target: u32, machine: &mut dyn Machine) {
        let flags = EntryFlags::PRESENT | EntryFlags::WRITABLE | EntryFlags::USER;
        self.alias_table.set(0, Entry::new(target, flags));
        self.directory
            .set(ALIAS_SLOT, Entry::new(self.alias_table.physical_address(), flags));
        machine.load_page_directory(&self.directory);
    }

    pub fn directory(&self) -> &PageDirectory {
        &self.directory
    }

    pub fn window_entry(&self) -> Entry {
        self.directory.entry(WINDOW_SLOT)
    }

    /// Marco físico que hay ahora detrás de la ventana del proceso.
    pub fn window_frame(&self) -> Option<u32> {
        let entry = self.window_entry();
        entry.is_present().then(|| entry.frame())
    }

    /// Página física que hay ahora detrás del alias de vídeo.
    pub fn alias_target(&self) -> Option<u32> {
        let entry = self.alias_table.entry(0);
        entry.is_present().then(|| entry.frame())
    }
}

impl Default for AddressSpace {
    fn default() -> Self {
        Self::new()
    }
}
