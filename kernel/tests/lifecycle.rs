// kernel/tests/lifecycle.rs
//
// execute / halt de punta a punta sobre el kernel de pruebas.

mod common;

use common::*;
use trios::config::{
    EXCEPTION_STATUS, MAX_PROCESSES, PROGRAM_LOAD_ADDR, USER_STACK_TOP, VIDEO_PHYS,
};
use trios::process::syscall::Dispatch;
use trios::process::{SaveTo, Transfer};

#[test]
fn boot_starts_the_shell_on_the_first_terminal() {
    let kernel = booted();

    assert_eq!(kernel.procs().bitmask(), 0b1);
    assert_eq!(kernel.procs().current(), Some(slot(0)));
    let pcb = kernel.procs().pcb(slot(0));
    assert!(pcb.active);
    assert_eq!(pcb.parent, None);
    assert_eq!(pcb.terminal, tty(0));
    assert_eq!(pcb.name.as_bytes(), b"shell");

    assert_eq!(kernel.sessions().visible(), tty(0));
    assert!(kernel.sessions().is_allocated(tty(0)));
    assert_eq!(kernel.sessions().terminal(tty(0)).active, Some(slot(0)));
    assert_eq!(kernel.address_space().window_frame(), Some(slot(0).frame()));
    assert_eq!(kernel.address_space().alias_target(), Some(VIDEO_PHYS));
    assert_eq!(kernel.machine().kernel_stack, Some(slot(0).kernel_stack_top()));
}

#[test]
fn boot_copies_the_shell_image_into_its_window() {
    let mut kernel = booted();
    let loaded = kernel.machine_mut().read_user(PROGRAM_LOAD_ADDR, 4);
    assert_eq!(loaded, [0x7F, b'E', b'L', b'F']);
}

#[test]
fn execute_then_halt_returns_status_and_frees_the_slot() {
    let mut kernel = booted();

    let Dispatch::Transfer(Transfer::Enter { save, launch }) = exec(&mut kernel, b"hello") else {
        panic!("execute should enter the child");
    };
    assert_eq!(launch.slot, slot(1));
    assert_eq!(save, SaveTo::Caller(slot(1)));
    assert_eq!(launch.entry, HELLO_ENTRY);
    assert_eq!(launch.user_stack, USER_STACK_TOP);
    assert_eq!(launch.kernel_stack, slot(1).kernel_stack_top());

    assert_eq!(kernel.procs().current(), Some(slot(1)));
    assert_eq!(kernel.procs().bitmask(), 0b11);
    assert!(!kernel.procs().pcb(slot(0)).active);
    assert_eq!(kernel.procs().pcb(slot(1)).parent, Some(slot(0)));
    assert_eq!(kernel.procs().pcb(slot(1)).terminal, tty(0));
    assert_eq!(kernel.sessions().terminal(tty(0)).active, Some(slot(1)));
    assert_eq!(kernel.address_space().window_frame(), Some(slot(1).frame()));
    assert_eq!(kernel.machine().kernel_stack, Some(slot(1).kernel_stack_top()));

    let halted = syscall(&mut kernel, call::HALT, 7, 0, 0);
    assert_eq!(
        halted,
        Dispatch::Transfer(Transfer::Unwind {
            from: slot(1),
            status: 7
        })
    );
    assert_eq!(kernel.procs().current(), Some(slot(0)));
    assert_eq!(kernel.procs().bitmask(), 0b1);
    assert!(kernel.procs().pcb(slot(0)).active);
    assert_eq!(kernel.sessions().terminal(tty(0)).active, Some(slot(0)));
    assert_eq!(kernel.address_space().window_frame(), Some(slot(0).frame()));
    assert_eq!(kernel.machine().kernel_stack, Some(slot(0).kernel_stack_top()));

    // El slot se reutiliza
    let Dispatch::Transfer(Transfer::Enter { launch, .. }) = exec(&mut kernel, b"hello") else {
        panic!("second execute should succeed");
    };
    assert_eq!(launch.slot, slot(1));
}

#[test]
fn halt_status_is_one_byte() {
    let mut kernel = booted();
    exec(&mut kernel, b"hello");
    assert_eq!(
        syscall(&mut kernel, call::HALT, 0x1FF, 0, 0),
        Dispatch::Transfer(Transfer::Unwind {
            from: slot(1),
            status: 0xFF
        })
    );
}

#[test]
fn children_keep_their_own_memory() {
    let mut kernel = booted();
    kernel.machine_mut().write_user(BUF, b"parent");
    exec(&mut kernel, b"hello");
    kernel.machine_mut().write_user(BUF, b"child!");
    syscall(&mut kernel, call::HALT, 0, 0, 0);
    assert_eq!(kernel.machine_mut().read_user(BUF, 6), b"parent");
}

#[test]
fn missing_program_changes_nothing() {
    let mut kernel = booted();
    let directory = kernel.address_space().directory().clone();
    let loads = kernel.machine().directory_loads;

    assert_eq!(exec(&mut kernel, b"nonexistent"), Dispatch::Complete(-1));
    assert_eq!(exec(&mut kernel, b"   "), Dispatch::Complete(-1));
    assert_eq!(exec(&mut kernel, b"."), Dispatch::Complete(-1));

    assert_eq!(kernel.procs().bitmask(), 0b1);
    assert_eq!(kernel.procs().current(), Some(slot(0)));
    assert!(*kernel.address_space().directory() == directory);
    assert_eq!(kernel.machine().directory_loads, loads);
}

#[test]
fn bad_image_is_rolled_back() {
    let mut kernel = booted();
    let directory = kernel.address_space().directory().clone();

    assert_eq!(exec(&mut kernel, b"broken"), Dispatch::Complete(-1));

    assert_eq!(kernel.procs().bitmask(), 0b1);
    assert_eq!(kernel.procs().current(), Some(slot(0)));
    assert!(kernel.procs().pcb(slot(0)).active);
    assert!(*kernel.address_space().directory() == directory);
    assert_eq!(kernel.address_space().window_frame(), Some(slot(0).frame()));
    assert_eq!(kernel.sessions().terminal(tty(0)).active, Some(slot(0)));
}

#[test]
fn ninth_process_is_refused() {
    let mut kernel = booted();
    for n in 1..MAX_PROCESSES {
        let Dispatch::Transfer(Transfer::Enter { launch, .. }) = exec(&mut kernel, b"hello") else {
            panic!("execute {} should succeed", n);
        };
        assert_eq!(launch.slot, slot(n));
    }
    assert_eq!(kernel.procs().bitmask(), 0xFF);

    let directory = kernel.address_space().directory().clone();
    assert_eq!(exec(&mut kernel, b"hello"), Dispatch::Complete(-1));
    assert_eq!(kernel.procs().bitmask(), 0xFF);
    assert_eq!(kernel.procs().current(), Some(slot(MAX_PROCESSES - 1)));
    assert!(*kernel.address_space().directory() == directory);
}

#[test]
fn getargs_returns_the_argument_tail() {
    let mut kernel = booted();
    exec(&mut kernel, b"  cat   frame0.txt  ");

    assert_eq!(syscall(&mut kernel, call::GETARGS, BUF, 32, 0), Dispatch::Complete(0));
    assert_eq!(kernel.machine_mut().read_user(BUF, 11), b"frame0.txt\0");

    // No cabe el terminador
    assert_eq!(syscall(&mut kernel, call::GETARGS, BUF, 10, 0), Dispatch::Complete(-1));
    assert_eq!(syscall(&mut kernel, call::GETARGS, 0, 32, 0), Dispatch::Complete(-1));
}

#[test]
fn getargs_without_arguments_fails() {
    let mut kernel = booted();
    exec(&mut kernel, b"hello");
    assert_eq!(syscall(&mut kernel, call::GETARGS, BUF, 32, 0), Dispatch::Complete(-1));
}

#[test]
fn exception_unwinds_with_status_256() {
    let mut kernel = booted();
    exec(&mut kernel, b"hello");

    let transfer = kernel.exception(0);
    assert_eq!(
        transfer,
        Some(Transfer::Unwind {
            from: slot(1),
            status: EXCEPTION_STATUS
        })
    );
    assert_eq!(kernel.procs().bitmask(), 0b1);
    assert_eq!(kernel.procs().current(), Some(slot(0)));
    assert!(screen_text(&kernel).contains("Exception: Divide Error (vector 0)"));
}

#[test]
fn exception_without_a_process_is_not_handled() {
    let mut kernel = kernel();
    assert_eq!(kernel.exception(14), None);
}

#[test]
fn halting_the_last_shell_starts_a_new_one() {
    let mut kernel = booted();
    let Dispatch::Transfer(Transfer::Enter { save, launch }) =
        syscall(&mut kernel, call::HALT, 0, 0, 0)
    else {
        panic!("the shell should be restarted");
    };
    assert_eq!(save, SaveTo::Discard);
    assert_eq!(launch.slot, slot(0));
    assert_eq!(launch.entry, SHELL_ENTRY);
    assert_eq!(kernel.procs().bitmask(), 0b1);
    assert_eq!(kernel.sessions().terminal(tty(0)).active, Some(slot(0)));
    assert!(kernel.sessions().is_allocated(tty(0)));
}

#[test]
fn halt_closes_open_files() {
    let mut kernel = booted();
    exec(&mut kernel, b"cat frame0.txt");
    assert_eq!(open(&mut kernel, b"frame0.txt"), Dispatch::Complete(2));
    assert!(kernel.procs().pcb(slot(1)).files.is_open(2));

    syscall(&mut kernel, call::HALT, 0, 0, 0);
    assert!(!kernel.procs().pcb(slot(1)).files.is_open(2));

    // El siguiente proceso en el slot empieza con sólo stdin/stdout
    exec(&mut kernel, b"hello");
    let files = &kernel.procs().pcb(slot(1)).files;
    assert!(files.is_open(0));
    assert!(files.is_open(1));
    assert!(!files.is_open(2));
}

#[test]
fn nested_shell_starts_on_a_clean_screen() {
    let mut kernel = booted();
    put_str(&mut kernel, BUF, b"old output\n");
    assert_eq!(syscall(&mut kernel, call::WRITE, 1, BUF, 11), Dispatch::Complete(11));

    // Un programa cualquiera hereda la pantalla tal cual
    exec(&mut kernel, b"hello");
    assert_eq!(kernel.machine().screen_row(0), "old output");

    let Dispatch::Transfer(Transfer::Enter { launch, .. }) = exec(&mut kernel, b"shell") else {
        panic!("nested shell should start");
    };
    assert_eq!(launch.slot, slot(2));
    assert_eq!(launch.entry, SHELL_ENTRY);
    assert_eq!(kernel.machine().screen_row(0), "");
    assert_eq!(kernel.sessions().terminal(tty(0)).cursor(), 0);
    assert_eq!(kernel.sessions().terminal(tty(0)).active, Some(slot(2)));
}
