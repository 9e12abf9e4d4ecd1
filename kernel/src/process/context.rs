// kernel/src/process/context.rs

use log::debug;

use super::Slot;
use crate::fs::FileSystem;
use crate::kernel::Kernel;
use crate::machine::Machine;

/// Estado de ejecución guardado en el lado kernel: los punteros de pila y
/// base donde se suspendió un proceso. Los registros callee-saved y la
/// dirección de vuelta viven en esa pila (ver `process::switch`).
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Context {
    pub esp: u32,
    pub ebp: u32,
}

impl Context {
    pub const fn empty() -> Self {
        Self { esp: 0, ebp: 0 }
    }
}

/// Primera entrada a un programa recién cargado.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Launch {
    pub slot: Slot,
    pub entry: u32,
    pub user_stack: u32,
    pub kernel_stack: u32,
}

/// Dónde guarda su propio punto de suspensión quien arranca un [`Launch`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveTo {
    /// Llamada a `execute`: contexto de retorno del hijo, reanudado por su halt.
    Caller(Slot),
    /// Proceso interrumpido para arrancar una shell de sesión; lo reanuda el planificador.
    Preempted(Slot),
    /// No hay a dónde volver.
    Discard,
}

/// Transferencia de control no local que pide el núcleo.
///
/// El núcleo sólo lleva las cuentas. Quien llama hace la transferencia
/// tras soltar el lock del kernel, aún con interrupciones deshabilitadas.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transfer {
    /// Guarda el proceso en marcha en `from` y reanuda `to`.
    Switch { from: Slot, to: Slot },
    /// Reanuda `to`; el código en marcha se abandona.
    Resume { to: Slot },
    /// Arranca un programa.
    Enter { save: SaveTo, launch: Launch },
    /// Devuelve `status` al `execute` que espera en el contexto de retorno de `from`.
    Unwind { from: Slot, status: u32 },
    /// No hay nada ejecutable.
    Idle,
}

impl<F: FileSystem, M: Machine> Kernel<F, M> {
    /// Hace de `target` el proceso actual: remapea la ventana del proceso y
    /// el alias de vídeo, y mueve esp0 a su pila de kernel.
    ///
    /// Devuelve la transferencia que completa el cambio.
    pub(crate) fn switch_to(&mut self, target: Slot) -> Transfer {
        let from = self.procs.current();
        self.procs.set_current(Some(target));
        self.space.remap_process_window(target.frame(), &mut self.machine);
        self.refresh_video_alias();
        self.machine.set_kernel_stack(target.kernel_stack_top());
        debug!("switch: {:?} -> {}", from, target);

        match from {
            Some(from) => Transfer::Switch { from, to: target },
            None => Transfer::Resume { to: target },
        }
    }

    /// Punto de suspensión de `slot` para el planificador.
    pub fn context_ptr(&mut self, slot: Slot) -> *mut Context {
        &mut self.procs.pcb_mut(slot).context
    }

    /// Punto de retorno del `execute` que arrancó `slot`.
    pub fn return_context_ptr(&mut self, slot: Slot) -> *mut Context {
        &mut self.procs.pcb_mut(slot).return_context
    }
}
