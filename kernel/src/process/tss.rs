// kernel/src/process/tss.rs
//
// GDT plana de 32 bits + TSS. El TSS sólo se usa para esp0: la pila de
// kernel que la CPU carga al pasar de ring 3 a ring 0.

use core::mem::size_of;

use lazy_static::lazy_static;
use log::debug;
use spin::{Mutex, Once};
use x86::bits32::task::TaskStateSegment;
use x86::dtables::{lgdt, DescriptorTablePointer};
use x86::segmentation::{
    load_cs, load_ds, load_es, load_fs, load_gs, load_ss, BuildDescriptor, CodeSegmentType,
    DataSegmentType, Descriptor, DescriptorBuilder, GateDescriptorBuilder, SegmentDescriptorBuilder,
    SegmentSelector,
};
use x86::task::load_tr;
use x86::Ring;

use crate::config::KERNEL_REGION_END;

pub const KERNEL_CODE_SELECTOR: u16 = 0x08;
pub const KERNEL_DATA_SELECTOR: u16 = 0x10;
pub const USER_CODE_SELECTOR: u16 = 0x18 | 3;
pub const USER_DATA_SELECTOR: u16 = 0x20 | 3;
pub const TSS_SELECTOR: u16 = 0x28;

// Límite de 0xFFFFF páginas de 4 KiB: los 4 GiB enteros
const FLAT_LIMIT: u32 = 0xF_FFFF;

lazy_static! {
    // Ubicación fija en memoria: la GDT apunta aquí
    static ref TSS: Mutex<TaskStateSegment> = {
        let mut tss = TaskStateSegment::new();
        tss.esp0 = KERNEL_REGION_END - 4;
        tss.ss0 = KERNEL_DATA_SELECTOR.into();
        tss.iobp_offset = (size_of::<TaskStateSegment>() as u16).into();
        Mutex::new(tss)
    };
}

// GDT se inicializa una vez
static GDT: Once<[Descriptor; 6]> = Once::new();

fn code_segment(dpl: Ring) -> Descriptor {
    <DescriptorBuilder as SegmentDescriptorBuilder<u32>>::code_descriptor(
        0,
        FLAT_LIMIT,
        CodeSegmentType::ExecuteRead,
    )
    .present()
    .dpl(dpl)
    .limit_granularity_4kb()
    .db()
    .finish()
}

fn data_segment(dpl: Ring) -> Descriptor {
    <DescriptorBuilder as SegmentDescriptorBuilder<u32>>::data_descriptor(
        0,
        FLAT_LIMIT,
        DataSegmentType::ReadWrite,
    )
    .present()
    .dpl(dpl)
    .limit_granularity_4kb()
    .db()
    .finish()
}

fn tss_segment(base: u32) -> Descriptor {
    let limit = size_of::<TaskStateSegment>() as u64 - 1;
    <DescriptorBuilder as GateDescriptorBuilder<u32>>::tss_descriptor(base.into(), limit, true)
        .present()
        .finish()
}

/// Carga la GDT, recarga los segmentos y el task register.
pub fn init() {
    let tss_base = &*TSS.lock() as *const TaskStateSegment as u32;
    let gdt = GDT.call_once(|| {
        [
            Descriptor::NULL,
            code_segment(Ring::Ring0),
            data_segment(Ring::Ring0),
            code_segment(Ring::Ring3),
            data_segment(Ring::Ring3),
            tss_segment(tss_base),
        ]
    });

    let data = SegmentSelector::from_raw(KERNEL_DATA_SELECTOR);
    unsafe {
        lgdt(&DescriptorTablePointer::new_from_slice(gdt));
        load_ds(data);
        load_es(data);
        load_fs(data);
        load_gs(data);
        load_ss(data);
        load_cs(SegmentSelector::from_raw(KERNEL_CODE_SELECTOR));
        load_tr(SegmentSelector::from_raw(TSS_SELECTOR));
    }
    debug!("gdt: loaded, tss at {:#010x}", tss_base);
}

/// Actualiza esp0. Sólo con interrupciones deshabilitadas.
pub fn set_kernel_stack(top: u32) {
    TSS.lock().esp0 = top;
}
