// kernel/src/mock.rs
//
// Dobles de prueba para correr el núcleo en el host: una `Machine` con
// RAM dispersa detrás de la ventana de proceso y una pantalla capturada,
// y un constructor de imágenes del sistema de archivos.

use std::collections::BTreeMap;
use std::string::String;
use std::vec::Vec;

use crate::config::{
    ELF_MAGIC, ENTRY_POINT_OFFSET, PAGE_SIZE, SCREEN_CELLS, SCREEN_COLS, USER_WINDOW_BASE,
};
use crate::fs::{FileType, BLOCK_SIZE, DENTRY_SIZE, MAX_DENTRIES};
use crate::machine::{Machine, MemoryFault};
use crate::memory::address_space::WINDOW_SLOT;
use crate::memory::{user_window_contains, PageDirectory};

// ============================================================================
// MockMachine
// ============================================================================

pub struct MockMachine {
    /// Páginas físicas tocadas hasta ahora, por dirección de página.
    pages: BTreeMap<u32, Vec<u8>>,
    window: Option<u32>,
    pub directory_loads: usize,
    pub kernel_stack: Option<u32>,
    pub rtc_rate: Option<u8>,
    pub screen: Vec<u8>,
    pub cursor: usize,
    pub rendered_rows: usize,
}

impl MockMachine {
    pub fn new() -> Self {
        Self {
            pages: BTreeMap::new(),
            window: None,
            directory_loads: 0,
            kernel_stack: None,
            rtc_rate: None,
            screen: std::vec![b' '; SCREEN_CELLS],
            cursor: 0,
            rendered_rows: 0,
        }
    }

    /// Marco físico detrás de la ventana del proceso en el último directorio cargado.
    pub fn window(&self) -> Option<u32> {
        self.window
    }

    /// Mapea la ventana a mano, para pruebas que no pasan por el espacio de direcciones.
    pub fn map_window(&mut self, frame: u32) {
        self.window = Some(frame);
    }

    pub fn read_user(&mut self, addr: u32, len: usize) -> Vec<u8> {
        let mut buf = std::vec![0u8; len];
        if let Err(fault) = self.copy_from_user(addr, &mut buf) {
            panic!("read_user: fault at {:#010x}", fault.addr);
        }
        buf
    }

    pub fn write_user(&mut self, addr: u32, data: &[u8]) {
        if let Err(fault) = self.copy_to_user(addr, data) {
            panic!("write_user: fault at {:#010x}", fault.addr);
        }
    }

    /// Fila de pantalla como texto, sin blancos al final.
    pub fn screen_row(&self, row: usize) -> String {
        let start = row * SCREEN_COLS;
        let text: String = self.screen[start..start + SCREEN_COLS]
            .iter()
            .map(|&b| b as char)
            .collect();
        String::from(text.trim_end())
    }

    /// Dirección física detrás de `addr`, si la copia puede tocarla.
    fn translate(&self, addr: u32, len: usize) -> Result<u32, MemoryFault> {
        let frame = self.window.ok_or(MemoryFault { addr })?;
        if !user_window_contains(addr, len as u32) {
            return Err(MemoryFault { addr });
        }
        Ok(frame + (addr - USER_WINDOW_BASE))
    }

    fn page(&mut self, physical: u32) -> &mut Vec<u8> {
        self.pages
            .entry(physical & !(PAGE_SIZE - 1))
            .or_insert_with(|| std::vec![0u8; PAGE_SIZE as usize])
    }
}

impl Default for MockMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl Machine for MockMachine {
    fn load_page_directory(&mut self, directory: &PageDirectory) {
        self.directory_loads += 1;
        let entry = directory.entry(WINDOW_SLOT);
        self.window = entry.is_present().then(|| entry.frame());
    }

    fn set_kernel_stack(&mut self, top: u32) {
        self.kernel_stack = Some(top);
    }

    fn copy_to_user(&mut self, addr: u32, data: &[u8]) -> Result<(), MemoryFault> {
        let mut physical = self.translate(addr, data.len())?;
        let mut rest = data;
        while !rest.is_empty() {
            let within = (physical % PAGE_SIZE) as usize;
            let len = rest.len().min(PAGE_SIZE as usize - within);
            self.page(physical)[within..within + len].copy_from_slice(&rest[..len]);
            rest = &rest[len..];
            physical += len as u32;
        }
        Ok(())
    }

    fn copy_from_user(&mut self, addr: u32, buf: &mut [u8]) -> Result<(), MemoryFault> {
        let mut physical = self.translate(addr, buf.len())?;
        let mut done = 0;
        while done < buf.len() {
            let within = (physical % PAGE_SIZE) as usize;
            let len = (buf.len() - done).min(PAGE_SIZE as usize - within);
            buf[done..done + len].copy_from_slice(&self.page(physical)[within..within + len]);
            done += len;
            physical += len as u32;
        }
        Ok(())
    }

    fn set_rtc_rate(&mut self, rate: u8) {
        self.rtc_rate = Some(rate);
    }

    fn render(&mut self, offset: usize, cells: &[u8]) {
        self.screen[offset..offset + cells.len()].copy_from_slice(cells);
        self.rendered_rows += 1;
    }

    fn move_cursor(&mut self, offset: usize) {
        self.cursor = offset;
    }
}

// ============================================================================
// ImageBuilder
// ============================================================================

struct Entry {
    name: Vec<u8>,
    file_type: FileType,
    data: Vec<u8>,
}

/// Construye una imagen del sistema de ficheros de arranque. Las entradas
/// mantienen el orden de inserción y los ficheros reciben inodos en ese orden.
#[derive(Default)]
pub struct ImageBuilder {
    entries: Vec<Entry>,
}

impl ImageBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn directory(self, name: &[u8]) -> Self {
        self.push(name, FileType::Directory, &[])
    }

    pub fn device(self, name: &[u8]) -> Self {
        self.push(name, FileType::Device, &[])
    }

    pub fn file(self, name: &[u8], data: &[u8]) -> Self {
        self.push(name, FileType::Regular, data)
    }

    /// Fichero regular con cabecera de programa cuyo punto de entrada es `entry`,
    /// seguida de `body`.
    pub fn program(self, name: &[u8], entry: u32, body: &[u8]) -> Self {
        let mut data = std::vec![0u8; PROGRAM_HEADER_LEN];
        data[..ELF_MAGIC.len()].copy_from_slice(&ELF_MAGIC);
        data[ENTRY_POINT_OFFSET..ENTRY_POINT_OFFSET + 4].copy_from_slice(&entry.to_le_bytes());
        data.extend_from_slice(body);
        self.push(name, FileType::Regular, &data)
    }

    fn push(mut self, name: &[u8], file_type: FileType, data: &[u8]) -> Self {
        assert!(self.entries.len() < MAX_DENTRIES, "too many entries");
        self.entries.push(Entry {
            name: name.to_vec(),
            file_type,
            data: data.to_vec(),
        });
        self
    }

    pub fn build(&self) -> Vec<u8> {
        let files: Vec<&Entry> = self
            .entries
            .iter()
            .filter(|e| e.file_type == FileType::Regular)
            .collect();
        let blocks_of = |e: &Entry| e.data.len().div_ceil(BLOCK_SIZE);
        let inode_count = files.len();
        let data_count: usize = files.iter().map(|e| blocks_of(e)).sum();

        let mut image = std::vec![0u8; (1 + inode_count + data_count) * BLOCK_SIZE];
        put_u32(&mut image, 0, self.entries.len() as u32);
        put_u32(&mut image, 4, inode_count as u32);
        put_u32(&mut image, 8, data_count as u32);

        let mut next_inode = 0u32;
        for (index, entry) in self.entries.iter().enumerate() {
            let base = (index + 1) * DENTRY_SIZE;
            image[base..base + entry.name.len()].copy_from_slice(&entry.name);
            put_u32(&mut image, base + 32, entry.file_type.as_raw());
            if entry.file_type == FileType::Regular {
                put_u32(&mut image, base + 36, next_inode);
                next_inode += 1;
            }
        }

        let mut next_block = 0usize;
        for (inode, entry) in files.iter().enumerate() {
            let inode_base = (1 + inode) * BLOCK_SIZE;
            put_u32(&mut image, inode_base, entry.data.len() as u32);
            for (i, chunk) in entry.data.chunks(BLOCK_SIZE).enumerate() {
                put_u32(&mut image, inode_base + 4 * (i + 1), next_block as u32);
                let start = (1 + inode_count + next_block) * BLOCK_SIZE;
                image[start..start + chunk.len()].copy_from_slice(chunk);
                next_block += 1;
            }
        }
        image
    }
}

/// Bytes de cabecera que `program` escribe antes del cuerpo.
const PROGRAM_HEADER_LEN: usize = 52;

fn put_u32(image: &mut [u8], offset: usize, value: u32) {
    image[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
}
