// kernel/tests/common/mod.rs
//
// Kernel de pruebas: imagen con una shell y unos cuantos programas sobre
// `MockMachine`, más atajos para hacer syscalls desde el proceso actual.

#![allow(dead_code)]

use trios::config::{BootConfig, USER_WINDOW_BASE};
use trios::fs::BootFs;
use trios::keyboard::InputEvent;
use trios::mock::{ImageBuilder, MockMachine};
use trios::process::syscall::Dispatch;
use trios::process::Slot;
use trios::terminal::TerminalId;
use trios::Kernel;

pub type TestKernel = Kernel<BootFs<'static>, MockMachine>;

pub const SHELL_ENTRY: u32 = 0x0804_8100;
pub const HELLO_ENTRY: u32 = 0x0804_8200;
pub const FRAME0: &[u8] = b"/\\/\\/\\ fish frame zero /\\/\\/\\\n";

/// Zona de la ventana del proceso que usan las pruebas para argumentos.
pub const SCRATCH: u32 = USER_WINDOW_BASE + 0x1000;
pub const BUF: u32 = USER_WINDOW_BASE + 0x2000;

pub mod call {
    pub const HALT: u32 = 1;
    pub const EXECUTE: u32 = 2;
    pub const READ: u32 = 3;
    pub const WRITE: u32 = 4;
    pub const OPEN: u32 = 5;
    pub const CLOSE: u32 = 6;
    pub const GETARGS: u32 = 7;
    pub const VIDMAP: u32 = 8;
    pub const SET_HANDLER: u32 = 9;
    pub const SIGRETURN: u32 = 10;
}

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn image() -> &'static [u8] {
    let image = ImageBuilder::new()
        .directory(b".")
        .device(b"rtc")
        .program(b"shell", SHELL_ENTRY, b"shell body")
        .program(b"hello", HELLO_ENTRY, &[0x90; 5000])
        .program(b"cat", HELLO_ENTRY, b"cat body")
        .file(b"broken", b"#!/bin/sh\necho not a program\n")
        .file(b"frame0.txt", FRAME0)
        .build();
    Box::leak(image.into_boxed_slice())
}

/// Kernel sobre la imagen estándar, aún sin arrancar.
pub fn kernel() -> TestKernel {
    init_logging();
    let fs = match BootFs::new(image()) {
        Ok(fs) => fs,
        Err(err) => panic!("test image rejected: {:?}", err),
    };
    Kernel::new(fs, MockMachine::new(), BootConfig::default())
}

/// Kernel con la primera shell en marcha en el slot 0 sobre tty0.
pub fn booted() -> TestKernel {
    let mut kernel = kernel();
    let launch = kernel.boot().expect("boot");
    assert_eq!(launch.slot, slot(0));
    kernel
}

pub fn slot(n: usize) -> Slot {
    Slot::new(n).expect("slot")
}

pub fn tty(n: usize) -> TerminalId {
    TerminalId::new(n).expect("terminal")
}

pub fn syscall(kernel: &mut TestKernel, number: u32, a1: u32, a2: u32, a3: u32) -> Dispatch {
    kernel.syscall(number, a1, a2, a3)
}

/// Escribe `text` más un NUL en la ventana actual en `addr`.
pub fn put_str(kernel: &mut TestKernel, addr: u32, text: &[u8]) {
    let machine = kernel.machine_mut();
    machine.write_user(addr, text);
    machine.write_user(addr + text.len() as u32, &[0]);
}

/// `execute(command)` desde el proceso actual.
pub fn exec(kernel: &mut TestKernel, command: &[u8]) -> Dispatch {
    put_str(kernel, SCRATCH, command);
    syscall(kernel, call::EXECUTE, SCRATCH, 0, 0)
}

pub fn open(kernel: &mut TestKernel, name: &[u8]) -> Dispatch {
    put_str(kernel, SCRATCH, name);
    syscall(kernel, call::OPEN, SCRATCH, 0, 0)
}

pub fn type_line(kernel: &mut TestKernel, text: &[u8]) {
    for &byte in text {
        assert_eq!(kernel.key_event(InputEvent::Char(byte)), None);
    }
    assert_eq!(kernel.key_event(InputEvent::Enter), None);
}

/// Todas las filas de pantalla unidas con saltos de línea, sin las filas en blanco del final.
pub fn screen_text(kernel: &TestKernel) -> String {
    let rows: Vec<String> = (0..trios::config::SCREEN_ROWS)
        .map(|row| kernel.machine().screen_row(row))
        .collect();
    rows.join("\n").trim_end().to_string()
}
