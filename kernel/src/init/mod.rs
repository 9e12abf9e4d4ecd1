// kernel/src/init/mod.rs
//
// Arranque en bare metal, en este orden:
//   serie -> línea de comandos -> logger -> GDT/TSS -> IDT -> PIC/PIT/RTC
//   -> kernel (paginación + primera shell) -> IRQs -> ring 3

pub mod machine;
pub mod multiboot;

use core::ptr;

use log::{error, info};
use spin::{Mutex, Once};

use crate::config::{BootConfig, KERNEL_BASE, KERNEL_REGION_END, KERNEL_STACK_SIZE, MAX_PROCESSES};
use crate::drivers::cmos;
use crate::fs::BootFs;
use crate::interrupts::{idt, pic};
use crate::kernel::Kernel;
use crate::process::switch::enter_user;
use crate::process::tss;
use crate::{logger, pit, serial};

pub use machine::BareMachine;

pub type BareKernel = Kernel<BootFs<'static>, BareMachine>;

static KERNEL: Once<Mutex<BareKernel>> = Once::new();

/// Ejecuta `f` con el kernel bloqueado. Las interrupciones deben estar deshabilitadas.
pub fn with_kernel<R>(f: impl FnOnce(&mut BareKernel) -> R) -> R {
    match KERNEL.get() {
        Some(kernel) => f(&mut kernel.lock()),
        None => panic!("kernel used before init"),
    }
}

/// Dirección más baja que usan las pilas de kernel de los slots.
const STACKS_BASE: u32 = KERNEL_REGION_END - KERNEL_STACK_SIZE * MAX_PROCESSES as u32;

#[no_mangle]
pub extern "C" fn kernel_main(magic: u32, info_addr: u32) -> ! {
    serial::init();

    // La línea de comandos vive en memoria baja, que deja de estar
    // mapeada al activar la paginación: se parsea antes.
    let boot = match unsafe { multiboot::parse(magic, info_addr) } {
        Ok(boot) => boot,
        Err(err) => panic!("multiboot: {:?}", err),
    };
    let config = BootConfig::parse(boot.cmdline);
    if logger::init(config.log_level).is_err() {
        crate::serial_println!("logger already set");
    }
    info!("trios: cmdline {:?}", boot.cmdline);

    let image_start = boot.module.as_ptr() as u32;
    let image_end = image_start + boot.module.len() as u32;
    if image_start < KERNEL_BASE || image_end > STACKS_BASE {
        panic!(
            "boot image at {:#010x}..{:#010x} is outside the kernel page",
            image_start, image_end
        );
    }

    tss::init();
    idt::init();
    pic::initialize();
    pit::init(config.pit_hz);
    cmos::init();

    let fs = match BootFs::new(boot.module) {
        Ok(fs) => fs,
        Err(err) => panic!("boot image: {:?}", err),
    };
    let kernel = KERNEL.call_once(|| Mutex::new(Kernel::new(fs, BareMachine::new(), config)));

    let launch = kernel.lock().boot();
    let launch = match launch {
        Ok(launch) => launch,
        Err(err) => {
            error!("boot: cannot start {:?}: {:?}", config.shell, err);
            panic!("no shell");
        }
    };

    pic::enable_irq(pic::Irq::Timer);
    pic::enable_irq(pic::Irq::Keyboard);
    pic::enable_irq(pic::Irq::Rtc);

    info!("trios: entering {} at {:#010x}", launch.slot, launch.entry);
    unsafe {
        enter_user(ptr::null_mut(), launch.entry, launch.user_stack);
    }
    panic!("first shell returned");
}
