// kernel/src/process/lifecycle.rs
//
// execute / halt. Ninguna de las dos hace la transferencia de control:
// devuelven un `Launch` o un `Transfer` que la capa de arquitectura
// ejecuta después de soltar el lock del kernel.

use log::{debug, error, info, warn};

use super::context::{Context, Launch, SaveTo, Transfer};
use super::loader::{load_image, parse_command};
use super::Slot;
use crate::config::{USER_STACK_TOP, VIDEO_PHYS};
use crate::fs::{FileSystem, FileType};
use crate::kernel::Kernel;
use crate::machine::Machine;
use crate::terminal::TerminalId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecError {
    EmptyCommand,
    NotFound,
    NoFreeSlot,
    /// No es un fichero regular o no tiene cabecera de programa válida.
    NotExecutable,
    ImageTooLarge,
    Fault,
}

/// Quién pidió el proceso nuevo.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    /// El proceso actual, vía `execute`; espera al hijo.
    Child,
    /// La shell raíz de una sesión de terminal; sin padre.
    Session(TerminalId),
}

impl<F: FileSystem, M: Machine> Kernel<F, M> {
    /// `execute` en nombre del proceso actual.
    pub fn execute(&mut self, line: &[u8]) -> Result<Launch, ExecError> {
        self.spawn(line, Origin::Child)
    }

    /// Reserva un slot, carga el programa y prepara su PCB.
    ///
    /// Si falla, la tabla de procesos, el proceso actual y la ventana del
    /// proceso quedan como estaban.
    pub(crate) fn spawn(&mut self, line: &[u8], origin: Origin) -> Result<Launch, ExecError> {
        let command = parse_command(line)?;
        let dentry = self
            .fs
            .resolve_by_name(command.name)
            .map_err(|_| ExecError::NotFound)?;
        if dentry.file_type != FileType::Regular {
            return Err(ExecError::NotExecutable);
        }
        if self.procs.is_full() {
            return Err(ExecError::NoFreeSlot);
        }

        let caller = self.procs.current();
        let previous_window = self.space.window_entry();
        let slot = self.procs.allocate().map_err(|_| ExecError::NoFreeSlot)?;
        self.space.remap_process_window(slot.frame(), &mut self.machine);

        let header = match load_image(&self.fs, &mut self.machine, dentry.inode) {
            Ok(header) => header,
            Err(err) => {
                self.procs.release(slot);
                self.procs.set_current(caller);
                self.space
                    .restore_process_window(previous_window, &mut self.machine);
                warn!("execute: {:?} rejected: {:?}", dentry.name, err);
                return Err(err);
            }
        };

        let (parent, terminal) = match origin {
            Origin::Child => (
                caller,
                caller.map_or(TerminalId::FIRST, |c| self.procs.pcb(c).terminal),
            ),
            Origin::Session(terminal) => (None, terminal),
        };
        if let Some(parent) = parent {
            self.procs.pcb_mut(parent).active = false;
        }

        let pcb = self.procs.pcb_mut(slot);
        pcb.active = true;
        pcb.parent = parent;
        pcb.terminal = terminal;
        pcb.name = dentry.name;
        pcb.set_args(command.args);
        pcb.files.install_console();
        pcb.context = Context::empty();
        pcb.return_context = Context::empty();

        // Toda shell arranca con la pantalla limpia, también con `execute`
        let fresh_shell = dentry.name.as_bytes() == self.config.shell.as_bytes();
        if matches!(origin, Origin::Session(_)) || fresh_shell {
            self.sessions.terminal_mut(terminal).reset();
            self.sessions.flush(terminal, &mut self.machine);
        }
        self.sessions.terminal_mut(terminal).active = Some(slot);
        self.machine.set_kernel_stack(slot.kernel_stack_top());
        self.refresh_video_alias();

        info!(
            "execute: {:?} in {} on {} (parent {:?})",
            dentry.name,
            slot,
            terminal,
            parent
        );
        Ok(Launch {
            slot,
            entry: header.entry,
            user_stack: USER_STACK_TOP,
            kernel_stack: slot.kernel_stack_top(),
        })
    }

    /// Termina el proceso actual.
    ///
    /// Un hijo vuelve al `execute` de su padre con `status`. Una shell
    /// de sesión se reinicia (última terminal viva) o cede la CPU
    /// a otra terminal. `None` indica que no había proceso actual.
    pub fn halt(&mut self, status: u32) -> Option<Transfer> {
        let slot = self.procs.current()?;
        self.close_all(slot);

        let (parent, terminal) = {
            let pcb = self.procs.pcb(slot);
            (pcb.parent, pcb.terminal)
        };
        info!("halt: {} status {}", slot, status);

        let Some(parent) = parent else {
            return Some(self.halt_session(terminal));
        };

        self.procs.pcb_mut(parent).active = true;
        self.machine.set_kernel_stack(parent.kernel_stack_top());
        self.space.remap_process_window(parent.frame(), &mut self.machine);
        self.sessions.terminal_mut(terminal).active = Some(parent);
        self.procs.deallocate();
        self.refresh_video_alias();
        Some(Transfer::Unwind { from: slot, status })
    }

    fn halt_session(&mut self, terminal: TerminalId) -> Transfer {
        // Único punto donde se libera el slot de una shell de sesión.
        self.procs.deallocate();
        self.sessions.terminal_mut(terminal).active = None;

        if self.sessions.live_count() <= 1 {
            warn!("halt: last shell on {} exited, restarting it", terminal);
            let shell = self.config.shell;
            return match self.spawn(shell.as_bytes(), Origin::Session(terminal)) {
                Ok(launch) => Transfer::Enter {
                    save: SaveTo::Discard,
                    launch,
                },
                Err(err) => {
                    error!("halt: cannot restart shell: {:?}", err);
                    Transfer::Idle
                }
            };
        }

        self.sessions.release(terminal);
        let visible = self.sessions.visible();
        let next = if visible == terminal {
            match self.sessions.next_live(terminal) {
                Some(next) => {
                    self.sessions.show(next, &mut self.machine);
                    next
                }
                None => return Transfer::Idle,
            }
        } else {
            visible
        };
        debug!("halt: {} closed, continuing on {}", terminal, next);

        match self.sessions.terminal(next).active {
            Some(target) => self.switch_to(target),
            None => Transfer::Idle,
        }
    }

    fn close_all(&mut self, slot: Slot) {
        let (mut io, files) = self.file_io(slot);
        for mut entry in files.take_all().into_iter().flatten() {
            if let Err(err) = entry.ops().close(&mut io, &mut entry) {
                debug!("halt: close {:?} failed: {:?}", entry.kind(), err);
            }
        }
    }

    /// Apunta el alias de vídeo a la memoria de vídeo real si la terminal
    /// del proceso actual está en pantalla, o a la página auxiliar de
    /// esa terminal en caso contrario.
    pub(crate) fn refresh_video_alias(&mut self) {
        let Some(slot) = self.procs.current() else {
            return;
        };
        let terminal = self.procs.pcb(slot).terminal;
        let target = if terminal == self.sessions.visible() {
            VIDEO_PHYS
        } else {
            terminal.scratch_page()
        };
        self.space.remap_video_alias(target, &mut self.machine);
    }
}
