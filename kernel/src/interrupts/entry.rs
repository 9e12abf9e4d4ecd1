// kernel/src/interrupts/entry.rs
//
// Stubs de entrada de todas las interrupciones y el despacho hacia el
// núcleo. Cada stub deja un `TrapFrame` en la pila del kernel y llama a
// `trap_dispatch`.
//
// Patrón de todos los handlers:
//   1. EOI al PIC (antes de cualquier transferencia: puede no volver)
//   2. tomar el lock del kernel, obtener un `Plan` (punteros crudos)
//   3. soltar el lock
//   4. ejecutar el plan (switch / enter_user / resume)

use core::arch::{asm, global_asm};
use core::ptr;

use lazy_static::lazy_static;
use spin::Mutex;

use super::pic::{self, Irq};
use super::{exception_name, EXCEPTION_VECTORS, KEYBOARD_VECTOR, RTC_VECTOR, SYSCALL_VECTOR, TIMER_VECTOR};
use crate::drivers::cmos;
use crate::init::{with_kernel, BareKernel};
use crate::keyboard::Decoder;
use x86::io::inb;
use crate::process::switch::{enter_user, resume_context, switch_context};
use crate::process::syscall::Dispatch;
use crate::process::{Context, SaveTo, Transfer};
use crate::serial_println_raw;

const KEYBOARD_DATA: u16 = 0x60;

global_asm!(
    r#"
.macro TRAP_NOERR n
.global isr\n
isr\n:
    push 0
    push \n
    jmp trap_common
.endm

.macro TRAP_ERR n
.global isr\n
isr\n:
    push \n
    jmp trap_common
.endm

TRAP_NOERR 0
TRAP_NOERR 1
TRAP_NOERR 2
TRAP_NOERR 3
TRAP_NOERR 4
TRAP_NOERR 5
TRAP_NOERR 6
TRAP_NOERR 7
TRAP_ERR   8
TRAP_NOERR 9
TRAP_ERR   10
TRAP_ERR   11
TRAP_ERR   12
TRAP_ERR   13
TRAP_ERR   14
TRAP_NOERR 15
TRAP_NOERR 16
TRAP_ERR   17
TRAP_NOERR 18
TRAP_NOERR 19
TRAP_NOERR 32
TRAP_NOERR 33
TRAP_NOERR 40
TRAP_NOERR 128

trap_common:
    pushad
    push ds
    push es
    push fs
    push gs
    mov ax, 0x10
    mov ds, ax
    mov es, ax
    mov fs, ax
    mov gs, ax
    cld
    push esp
    call trap_dispatch
    add esp, 4
    pop gs
    pop fs
    pop es
    pop ds
    popad
    add esp, 8
    iretd
"#
);

extern "C" {
    fn isr0();
    fn isr1();
    fn isr2();
    fn isr3();
    fn isr4();
    fn isr5();
    fn isr6();
    fn isr7();
    fn isr8();
    fn isr9();
    fn isr10();
    fn isr11();
    fn isr12();
    fn isr13();
    fn isr14();
    fn isr15();
    fn isr16();
    fn isr17();
    fn isr18();
    fn isr19();
    #[link_name = "isr32"]
    pub fn timer_entry();
    #[link_name = "isr33"]
    pub fn keyboard_entry();
    #[link_name = "isr40"]
    pub fn rtc_entry();
    #[link_name = "isr128"]
    pub fn syscall_entry();
}

pub static EXCEPTION_STUBS: [unsafe extern "C" fn(); EXCEPTION_VECTORS as usize] = [
    isr0, isr1, isr2, isr3, isr4, isr5, isr6, isr7, isr8, isr9, isr10, isr11, isr12, isr13, isr14,
    isr15, isr16, isr17, isr18, isr19,
];

/// Registros tal como los apilan `trap_common` y la CPU.
#[repr(C)]
#[derive(Debug)]
pub struct TrapFrame {
    pub gs: u32,
    pub fs: u32,
    pub es: u32,
    pub ds: u32,
    pub edi: u32,
    pub esi: u32,
    pub ebp: u32,
    _esp: u32,
    pub ebx: u32,
    pub edx: u32,
    pub ecx: u32,
    pub eax: u32,
    pub vector: u32,
    pub error_code: u32,
    pub eip: u32,
    pub cs: u32,
    pub eflags: u32,
}

impl TrapFrame {
    fn from_user(&self) -> bool {
        self.cs & 0b11 == 3
    }
}

lazy_static! {
    static ref DECODER: Mutex<Decoder> = Mutex::new(Decoder::new());
}

// ============================================================================
// Plan: lo que queda por hacer fuera del lock
// ============================================================================

enum Plan {
    Switch { old: *mut Context, new: *mut Context },
    Resume { context: *mut Context, value: u32 },
    Enter { save: *mut Context, entry: u32, user_stack: u32 },
    Idle,
}

fn plan(kernel: &mut BareKernel, transfer: Transfer) -> Plan {
    match transfer {
        Transfer::Switch { from, to } => Plan::Switch {
            old: kernel.context_ptr(from),
            new: kernel.context_ptr(to),
        },
        Transfer::Resume { to } => Plan::Resume {
            context: kernel.context_ptr(to),
            value: 0,
        },
        Transfer::Enter { save, launch } => Plan::Enter {
            save: match save {
                SaveTo::Caller(child) => kernel.return_context_ptr(child),
                SaveTo::Preempted(slot) => kernel.context_ptr(slot),
                SaveTo::Discard => ptr::null_mut(),
            },
            entry: launch.entry,
            user_stack: launch.user_stack,
        },
        Transfer::Unwind { from, status } => Plan::Resume {
            context: kernel.return_context_ptr(from),
            value: status,
        },
        Transfer::Idle => Plan::Idle,
    }
}

/// Ejecuta un plan con el lock del kernel suelto. Sólo vuelve cuando se
/// reanuda el código suspendido; el valor es el estado de halt de un hijo
/// arrancado con `SaveTo::Caller`.
fn run(plan: Plan) -> u32 {
    unsafe {
        match plan {
            Plan::Switch { old, new } => {
                switch_context(old, new);
                0
            }
            Plan::Resume { context, value } => resume_context(context, value),
            Plan::Enter {
                save,
                entry,
                user_stack,
            } => enter_user(save, entry, user_stack),
            Plan::Idle => idle(),
        }
    }
}

/// Nada ejecutable: espera a que una tecla o un tick traiga trabajo.
fn idle() -> ! {
    loop {
        unsafe {
            asm!("sti", "hlt", "cli", options(nomem, nostack));
        }
    }
}

fn transfer_with(f: impl FnOnce(&mut BareKernel) -> Option<Transfer>) {
    let plan = with_kernel(|kernel| f(kernel).map(|transfer| plan(kernel, transfer)));
    if let Some(plan) = plan {
        run(plan);
    }
}

// ============================================================================
// Despacho
// ============================================================================

#[no_mangle]
extern "C" fn trap_dispatch(frame: &mut TrapFrame) {
    let vector = frame.vector as u8;
    match vector {
        v if v < EXCEPTION_VECTORS => exception(frame),
        TIMER_VECTOR => {
            pic::end_of_interrupt(Irq::Timer);
            transfer_with(|kernel| kernel.timer_tick());
        }
        KEYBOARD_VECTOR => {
            let scancode = unsafe { inb(KEYBOARD_DATA) };
            pic::end_of_interrupt(Irq::Keyboard);
            let event = DECODER.lock().feed(scancode);
            if let Some(event) = event {
                transfer_with(|kernel| kernel.key_event(event));
            }
        }
        RTC_VECTOR => {
            cmos::acknowledge();
            pic::end_of_interrupt(Irq::Rtc);
            with_kernel(|kernel| kernel.rtc_tick());
        }
        SYSCALL_VECTOR => syscall(frame),
        _ => serial_println_raw!("trap: stray vector {}", vector),
    }
}

enum Step {
    Done(u32),
    Wait,
    Go(Plan),
}

fn syscall(frame: &mut TrapFrame) {
    loop {
        let step = with_kernel(|kernel| {
            match kernel.syscall(frame.eax, frame.ebx, frame.ecx, frame.edx) {
                Dispatch::Complete(value) => Step::Done(value as u32),
                Dispatch::Pending => Step::Wait,
                Dispatch::Transfer(transfer) => Step::Go(plan(kernel, transfer)),
            }
        });
        match step {
            Step::Done(value) => {
                frame.eax = value;
                return;
            }
            // Bloqueada: esperar una interrupción con el lock suelto y reintentar
            Step::Wait => unsafe {
                asm!("sti", "hlt", "cli", options(nomem, nostack));
            },
            Step::Go(plan) => {
                frame.eax = run(plan);
                return;
            }
        }
    }
}

fn exception(frame: &mut TrapFrame) {
    let vector = frame.vector as u8;
    let name = exception_name(vector);
    if !frame.from_user() {
        panic!(
            "{} in kernel at {:#010x} (error {:#x})",
            name, frame.eip, frame.error_code
        );
    }

    serial_println_raw!("exception: {} at {:#010x} (error {:#x})", name, frame.eip, frame.error_code);
    let plan = with_kernel(|kernel| kernel.exception(vector).map(|transfer| plan(kernel, transfer)));
    match plan {
        Some(plan) => {
            run(plan);
        }
        None => panic!("{} with no current process", name),
    }
}
