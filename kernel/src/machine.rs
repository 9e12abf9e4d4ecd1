// kernel/src/machine.rs
//
// Lo que el núcleo necesita de la CPU y de los dispositivos que no
// maneja él mismo. La implementación sobre hardware está en
// `init::machine`; las pruebas usan `mock::MockMachine`.

use crate::memory::PageDirectory;

/// Una copia de memoria de usuario tocó una dirección fuera de la ventana del proceso.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryFault {
    pub addr: u32,
}

pub trait Machine {
    /// Carga la raíz del espacio de direcciones (CR3), lo que también vacía la TLB.
    fn load_page_directory(&mut self, directory: &PageDirectory);

    /// Pila de kernel para la próxima transición ring 3 -> ring 0 (TSS.esp0).
    fn set_kernel_stack(&mut self, top: u32);

    fn copy_to_user(&mut self, addr: u32, data: &[u8]) -> Result<(), MemoryFault>;

    fn copy_from_user(&mut self, addr: u32, buf: &mut [u8]) -> Result<(), MemoryFault>;

    /// Programa el código de frecuencia periódica del RTC (6..=15).
    fn set_rtc_rate(&mut self, rate: u8);

    /// Dibuja `cells` en la pantalla física a partir de la celda `offset`.
    fn render(&mut self, offset: usize, cells: &[u8]);

    fn move_cursor(&mut self, offset: usize);
}
