// kernel/src/interrupts/idt.rs
//
// Interrupt Descriptor Table de 32 bits. Todas las puertas son interrupt
// gates (IF a 0 al entrar): el kernel entero corre con interrupciones
// deshabilitadas salvo en la espera de una syscall bloqueada.

use lazy_static::lazy_static;
use x86::dtables::{lidt, DescriptorTablePointer};
use x86::segmentation::{BuildDescriptor, Descriptor, DescriptorBuilder, GateDescriptorBuilder, SegmentSelector};
use x86::Ring;

use super::entry;
use super::{EXCEPTION_VECTORS, KEYBOARD_VECTOR, RTC_VECTOR, SYSCALL_VECTOR, TIMER_VECTOR};
use crate::process::tss::KERNEL_CODE_SELECTOR;

// ============================================================================
// Interrupt Descriptor Table
// ============================================================================

#[repr(C, align(8))]
pub struct InterruptDescriptorTable {
    entries: [Descriptor; 256],
}

impl InterruptDescriptorTable {
    pub const fn new() -> Self {
        Self {
            entries: [Descriptor::NULL; 256],
        }
    }

    /// Puerta de interrupción presente hacia `handler` con el DPL dado.
    pub fn set_handler(&mut self, vector: u8, handler: unsafe extern "C" fn(), dpl: Ring) {
        let selector = SegmentSelector::from_raw(KERNEL_CODE_SELECTOR);
        let offset = handler as usize as u32;
        self.entries[vector as usize] =
            <DescriptorBuilder as GateDescriptorBuilder<u32>>::interrupt_descriptor(selector, offset)
                .present()
                .dpl(dpl)
                .finish();
    }

    pub fn load(&'static self) {
        unsafe {
            lidt(&DescriptorTablePointer::new_from_slice(&self.entries));
        }
    }
}

lazy_static! {
    static ref IDT: InterruptDescriptorTable = {
        let mut idt = InterruptDescriptorTable::new();
        for vector in 0..EXCEPTION_VECTORS {
            idt.set_handler(vector, entry::EXCEPTION_STUBS[vector as usize], Ring::Ring0);
        }
        idt.set_handler(TIMER_VECTOR, entry::timer_entry, Ring::Ring0);
        idt.set_handler(KEYBOARD_VECTOR, entry::keyboard_entry, Ring::Ring0);
        idt.set_handler(RTC_VECTOR, entry::rtc_entry, Ring::Ring0);
        // int 0x80 desde ring 3
        idt.set_handler(SYSCALL_VECTOR, entry::syscall_entry, Ring::Ring3);
        idt
    };
}

pub fn init() {
    IDT.load();
}
