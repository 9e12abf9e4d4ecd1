// kernel/src/drivers/mod.rs
//
// Registro de dispositivos abribles por nombre con `open`.
// Cada driver aporta un par (nombre, FileHandle estático).

pub mod rtc;

#[cfg(all(target_arch = "x86", target_os = "none"))]
pub mod cmos;
#[cfg(all(target_arch = "x86", target_os = "none"))]
pub mod vga;

use crate::process::file::FileHandle;

struct DeviceEntry {
    name: &'static [u8],
    handle: &'static dyn FileHandle,
}

static DEVICES: &[DeviceEntry] = &[DeviceEntry {
    name: b"rtc",
    handle: &rtc::RTC,
}];

/// Operaciones del dispositivo llamado `name`, si hay uno registrado.
pub fn open_device(name: &[u8]) -> Option<&'static dyn FileHandle> {
    DEVICES
        .iter()
        .find(|device| device.name == name)
        .map(|device| device.handle)
}
