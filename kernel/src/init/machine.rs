// kernel/src/init/machine.rs
//
// `Machine` sobre el hardware real.

use core::ptr;

use x86::controlregs::{cr0, cr0_write, cr3_write, cr4, cr4_write, Cr0, Cr4};

use crate::drivers::{cmos, vga};
use crate::machine::{Machine, MemoryFault};
use crate::memory::{user_window_contains, PageDirectory};
use crate::process::tss;

pub struct BareMachine {
    paging: bool,
}

impl BareMachine {
    pub const fn new() -> Self {
        Self { paging: false }
    }
}

impl Machine for BareMachine {
    fn load_page_directory(&mut self, directory: &PageDirectory) {
        let root = directory.physical_address();
        unsafe {
            cr3_write(root as u64);
        }
        if self.paging {
            return;
        }
        // Primera carga: páginas de 4 MiB, páginas globales y paginación
        unsafe {
            cr4_write(cr4() | Cr4::CR4_ENABLE_PSE | Cr4::CR4_ENABLE_GLOBAL_PAGES);
            cr0_write(cr0() | Cr0::CR0_ENABLE_PAGING);
        }
        self.paging = true;
    }

    fn set_kernel_stack(&mut self, top: u32) {
        tss::set_kernel_stack(top);
    }

    fn copy_to_user(&mut self, addr: u32, data: &[u8]) -> Result<(), MemoryFault> {
        if !user_window_contains(addr, data.len() as u32) {
            return Err(MemoryFault { addr });
        }
        unsafe {
            ptr::copy_nonoverlapping(data.as_ptr(), addr as usize as *mut u8, data.len());
        }
        Ok(())
    }

    fn copy_from_user(&mut self, addr: u32, buf: &mut [u8]) -> Result<(), MemoryFault> {
        if !user_window_contains(addr, buf.len() as u32) {
            return Err(MemoryFault { addr });
        }
        unsafe {
            ptr::copy_nonoverlapping(addr as usize as *const u8, buf.as_mut_ptr(), buf.len());
        }
        Ok(())
    }

    fn set_rtc_rate(&mut self, rate: u8) {
        cmos::set_rate(rate);
    }

    fn render(&mut self, offset: usize, cells: &[u8]) {
        vga::render(offset, cells);
    }

    fn move_cursor(&mut self, offset: usize) {
        vga::move_cursor(offset);
    }
}
