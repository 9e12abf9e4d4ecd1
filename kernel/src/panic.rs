// kernel/src/panic.rs

use core::panic::PanicInfo;

use crate::serial_println_raw;

#[panic_handler]
fn panic(info: &PanicInfo) -> ! {
    unsafe {
        x86::irq::disable();
    }

    serial_println_raw!();
    serial_println_raw!("KERNEL PANIC!");
    serial_println_raw!("========================================");
    if let Some(location) = info.location() {
        serial_println_raw!("  at {}:{}:{}", location.file(), location.line(), location.column());
    }
    serial_println_raw!("  {}", info.message());

    crate::drivers::vga::panic_banner();

    loop {
        unsafe {
            x86::halt();
        }
    }
}
