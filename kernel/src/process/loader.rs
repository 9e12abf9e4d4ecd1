// kernel/src/process/loader.rs
//
// Línea de comandos y carga de imágenes de programa en la ventana de
// usuario. El programa se copia tal cual a 0x08048000; de la cabecera
// ELF sólo se mira el magic y el entry point.

use log::trace;

use super::ExecError;
use crate::config::{ELF_MAGIC, ENTRY_POINT_OFFSET, PAGE_SIZE, PROGRAM_LOAD_ADDR, USER_WINDOW_END};
use crate::fs::FileSystem;
use crate::machine::Machine;

/// Bytes de cabecera que lee el cargador: del magic al punto de entrada.
pub const HEADER_LEN: usize = ENTRY_POINT_OFFSET + 4;

const MAX_IMAGE: u32 = USER_WINDOW_END - PROGRAM_LOAD_ADDR;

/// Línea de comando partida en nombre de programa y resto de argumentos.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Command<'a> {
    pub name: &'a [u8],
    pub args: &'a [u8],
}

/// Parte `line` en el primer espacio tras recortarla. La línea acaba en
/// el primer NUL o salto de línea.
pub fn parse_command(line: &[u8]) -> Result<Command<'_>, ExecError> {
    let end = line
        .iter()
        .position(|&b| b == 0 || b == b'\n')
        .unwrap_or(line.len());
    let line = line[..end].trim_ascii();
    if line.is_empty() {
        return Err(ExecError::EmptyCommand);
    }

    let (name, args) = match line.iter().position(|&b| b == b' ') {
        Some(split) => (&line[..split], line[split + 1..].trim_ascii()),
        None => (line, &[][..]),
    };
    Ok(Command { name, args })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageHeader {
    pub entry: u32,
}

/// Comprueba el magic y saca el punto de entrada.
pub fn parse_header(bytes: &[u8]) -> Option<ImageHeader> {
    let header = bytes.get(..HEADER_LEN)?;
    if header[..ELF_MAGIC.len()] != ELF_MAGIC {
        return None;
    }
    let mut raw = [0u8; 4];
    raw.copy_from_slice(&header[ENTRY_POINT_OFFSET..]);
    Some(ImageHeader {
        entry: u32::from_le_bytes(raw),
    })
}

/// Copia el fichero `inode` entero a la dirección de carga de la ventana
/// mapeada ahora mismo.
///
/// La cabecera se comprueba con el primer trozo: una imagen con mal
/// magic se rechaza antes de tocar la memoria de usuario.
pub fn load_image(
    fs: &dyn FileSystem,
    machine: &mut dyn Machine,
    inode: u32,
) -> Result<ImageHeader, ExecError> {
    let size = fs.size_of(inode).map_err(|_| ExecError::NotExecutable)?;
    if size > MAX_IMAGE {
        return Err(ExecError::ImageTooLarge);
    }

    let mut chunk = [0u8; PAGE_SIZE as usize];
    let mut header = None;
    let mut offset = 0u32;
    while offset < size {
        let got = fs
            .read_bytes(inode, offset, &mut chunk)
            .map_err(|_| ExecError::NotExecutable)?;
        if got == 0 {
            break;
        }
        if header.is_none() {
            header = Some(parse_header(&chunk[..got]).ok_or(ExecError::NotExecutable)?);
        }
        machine
            .copy_to_user(PROGRAM_LOAD_ADDR + offset, &chunk[..got])
            .map_err(|_| ExecError::Fault)?;
        offset += got as u32;
    }

    let header = header.ok_or(ExecError::NotExecutable)?;
    trace!("loader: inode {} ({} bytes) entry {:#010x}", inode, size, header.entry);
    Ok(header)
}
