// kernel/src/init/multiboot.rs
//
// Lo mínimo de la estructura de información de Multiboot v1: la línea
// de comandos y el primer módulo (la imagen del sistema de archivos).

use core::ffi::CStr;
use core::slice;

pub const BOOTLOADER_MAGIC: u32 = 0x2BAD_B002;

const FLAG_CMDLINE: u32 = 1 << 2;
const FLAG_MODS: u32 = 1 << 3;

#[allow(dead_code)]
#[repr(C)]
struct RawInfo {
    flags: u32,
    mem_lower: u32,
    mem_upper: u32,
    boot_device: u32,
    cmdline: u32,
    mods_count: u32,
    mods_addr: u32,
}

#[allow(dead_code)]
#[repr(C)]
struct RawModule {
    start: u32,
    end: u32,
    string: u32,
    reserved: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootError {
    BadMagic(u32),
    NoModule,
}

pub struct BootInfo {
    pub cmdline: &'static str,
    pub module: &'static [u8],
}

/// Lee la estructura que el bootloader dejó en `addr`.
///
/// # Safety
/// `addr` debe ser el puntero que un cargador Multiboot pasó en `ebx`, y
/// la paginación aún debe estar apagada.
pub unsafe fn parse(magic: u32, addr: u32) -> Result<BootInfo, BootError> {
    if magic != BOOTLOADER_MAGIC {
        return Err(BootError::BadMagic(magic));
    }
    let info = &*(addr as usize as *const RawInfo);

    let cmdline = if info.flags & FLAG_CMDLINE != 0 && info.cmdline != 0 {
        CStr::from_ptr(info.cmdline as usize as *const core::ffi::c_char)
            .to_str()
            .unwrap_or("")
    } else {
        ""
    };

    if info.flags & FLAG_MODS == 0 || info.mods_count == 0 {
        return Err(BootError::NoModule);
    }
    let module = &*(info.mods_addr as usize as *const RawModule);
    let len = module.end.saturating_sub(module.start) as usize;
    let module = slice::from_raw_parts(module.start as usize as *const u8, len);

    Ok(BootInfo { cmdline, module })
}
