// kernel/src/terminal/session.rs
//
// Las tres sesiones (F1..F3). Cada sesión tiene su terminal y, mientras
// está viva, una shell. Se crean bajo demanda al cambiar de terminal.

use log::{info, warn};

use super::{Terminal, TerminalId};
use crate::config::MAX_TERMINALS;
use crate::fs::FileSystem;
use crate::kernel::Kernel;
use crate::keyboard::InputEvent;
use crate::machine::Machine;
use crate::process::lifecycle::Origin;
use crate::process::{SaveTo, Transfer};

pub struct Sessions {
    terminals: [Terminal; MAX_TERMINALS],
    allocated: u8,
    visible: TerminalId,
}

impl Sessions {
    pub const fn new() -> Self {
        const BLANK: Terminal = Terminal::new();
        Self {
            terminals: [BLANK; MAX_TERMINALS],
            allocated: 0,
            visible: TerminalId::FIRST,
        }
    }

    pub fn visible(&self) -> TerminalId {
        self.visible
    }

    pub fn is_allocated(&self, id: TerminalId) -> bool {
        self.allocated & (1 << id.index()) != 0
    }

    pub fn allocate(&mut self, id: TerminalId) {
        self.allocated |= 1 << id.index();
    }

    pub fn release(&mut self, id: TerminalId) {
        self.allocated &= !(1 << id.index());
        self.terminals[id.index()].active = None;
    }

    pub fn live_count(&self) -> usize {
        self.allocated.count_ones() as usize
    }

    /// Primera terminal asignada después de `from`, dando la vuelta, sin contar `from`.
    pub fn next_live(&self, from: TerminalId) -> Option<TerminalId> {
        (1..MAX_TERMINALS)
            .filter_map(|step| TerminalId::new((from.index() + step) % MAX_TERMINALS))
            .find(|id| self.is_allocated(*id))
    }

    pub fn terminal(&self, id: TerminalId) -> &Terminal {
        &self.terminals[id.index()]
    }

    pub fn terminal_mut(&mut self, id: TerminalId) -> &mut Terminal {
        &mut self.terminals[id.index()]
    }

    /// Hace visible la terminal `id` y dibuja su buffer entero.
    pub fn show(&mut self, id: TerminalId, machine: &mut dyn Machine) {
        self.visible = id;
        self.terminals[id.index()].redraw(machine);
    }

    /// Vuelca la salida pendiente de `id` a pantalla si es visible.
    pub fn flush(&mut self, id: TerminalId, machine: &mut dyn Machine) {
        if id == self.visible {
            self.terminals[id.index()].flush(machine);
        }
    }
}

impl Default for Sessions {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Cambio de terminal y teclado
// ============================================================================

impl<F: FileSystem, M: Machine> Kernel<F, M> {
    /// F1..F3. Muestra `target` y arranca su shell la primera vez.
    pub fn switch_terminal(&mut self, target: TerminalId) -> Option<Transfer> {
        if target == self.sessions.visible() {
            return None;
        }

        if !self.sessions.is_allocated(target) {
            if self.procs.is_full() {
                warn!("terminal: cannot open {}, process table full", target);
                let visible = self.sessions.visible();
                self.sessions
                    .terminal_mut(visible)
                    .write(b"\nMaximum number of processes reached\n");
                self.sessions.flush(visible, &mut self.machine);
                return None;
            }
            return self.open_session(target);
        }

        self.sessions.show(target, &mut self.machine);
        info!("terminal: showing {}", target);
        match self.sessions.terminal(target).active {
            Some(slot) if self.procs.current() != Some(slot) => Some(self.switch_to(slot)),
            _ => {
                self.refresh_video_alias();
                None
            }
        }
    }

    fn open_session(&mut self, target: TerminalId) -> Option<Transfer> {
        let previous = self.sessions.visible();
        let interrupted = self.procs.current();

        self.sessions.allocate(target);
        self.sessions.show(target, &mut self.machine);

        let shell = self.config.shell;
        match self.spawn(shell.as_bytes(), Origin::Session(target)) {
            Ok(launch) => {
                info!("terminal: opened {} with shell in {}", target, launch.slot);
                let save = match interrupted {
                    Some(slot) => SaveTo::Preempted(slot),
                    None => SaveTo::Discard,
                };
                Some(Transfer::Enter { save, launch })
            }
            Err(err) => {
                warn!("terminal: shell for {} failed: {:?}", target, err);
                self.sessions.release(target);
                self.sessions.show(previous, &mut self.machine);
                self.refresh_video_alias();
                None
            }
        }
    }

    /// Tecla decodificada. Las de edición van a la terminal visible.
    pub fn key_event(&mut self, event: InputEvent) -> Option<Transfer> {
        if let InputEvent::SwitchTerminal(index) = event {
            return TerminalId::new(index).and_then(|id| self.switch_terminal(id));
        }
        let visible = self.sessions.visible();
        self.sessions.terminal_mut(visible).handle_input(event);
        self.sessions.flush(visible, &mut self.machine);
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(n: usize) -> TerminalId {
        TerminalId::new(n).unwrap()
    }

    #[test]
    fn next_live_wraps_and_skips_self() {
        let mut sessions = Sessions::new();
        sessions.allocate(id(0));
        sessions.allocate(id(2));
        assert_eq!(sessions.next_live(id(0)), Some(id(2)));
        assert_eq!(sessions.next_live(id(2)), Some(id(0)));
        assert_eq!(sessions.next_live(id(1)), Some(id(2)));

        sessions.release(id(2));
        assert_eq!(sessions.next_live(id(0)), None);
        assert_eq!(sessions.live_count(), 1);
    }

    #[test]
    fn flush_skips_background_terminals() {
        let mut machine = crate::mock::MockMachine::new();
        let mut sessions = Sessions::new();
        sessions.allocate(id(0));
        sessions.allocate(id(1));
        sessions.show(id(0), &mut machine);

        sessions.terminal_mut(id(1)).write(b"hidden");
        sessions.flush(id(1), &mut machine);
        assert_eq!(machine.screen_row(0), "");

        sessions.show(id(1), &mut machine);
        assert_eq!(machine.screen_row(0), "hidden");
    }
}
