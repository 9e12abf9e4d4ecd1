// kernel/src/lib.rs
//
// Núcleo de procesos y memoria de un kernel x86 de 32 bits con tres
// terminales. Todo lo que no toca hardware compila también en el host
// (feature `std`) para poder testearlo; el resto vive detrás de
// `cfg(all(target_arch = "x86", target_os = "none"))`.

#![cfg_attr(not(feature = "std"), no_std)]

#[cfg(any(test, feature = "std"))]
extern crate std;

pub mod config;
pub mod drivers;
pub mod fs;
pub mod interrupts;
pub mod kernel;
pub mod keyboard;
pub mod machine;
pub mod memory;
pub mod process;
pub mod terminal;

#[cfg(any(test, feature = "std"))]
pub mod mock;

#[cfg(all(target_arch = "x86", target_os = "none"))]
pub mod init;
#[cfg(all(target_arch = "x86", target_os = "none"))]
pub mod logger;
#[cfg(all(target_arch = "x86", target_os = "none"))]
mod panic;
#[cfg(all(target_arch = "x86", target_os = "none"))]
pub mod pit;
#[cfg(all(target_arch = "x86", target_os = "none"))]
pub mod serial;

pub use kernel::Kernel;
