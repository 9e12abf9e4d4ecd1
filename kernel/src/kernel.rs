// kernel/src/kernel.rs
//
// Estado completo del kernel en un solo valor. En bare metal vive en un
// `spin::Mutex` estático (ver `init`); en los tests, en la pila del test.
// Todas las entradas (syscall, timer, teclado, RTC, excepción) son
// métodos de `Kernel` que devuelven la transferencia de control a hacer.

use log::info;

use crate::config::BootConfig;
use crate::drivers::rtc::RtcClock;
use crate::fs::FileSystem;
use crate::machine::Machine;
use crate::memory::AddressSpace;
use crate::process::file::{FileIo, FileTable};
use crate::process::lifecycle::Origin;
use crate::process::scheduler::Scheduler;
use crate::process::{ExecError, Launch, ProcessTable, Slot};
use crate::terminal::{Sessions, TerminalId};

pub struct Kernel<F, M> {
    pub(crate) fs: F,
    pub(crate) machine: M,
    pub(crate) config: BootConfig,
    pub(crate) space: AddressSpace,
    pub(crate) procs: ProcessTable,
    pub(crate) scheduler: Scheduler,
    pub(crate) sessions: Sessions,
    pub(crate) rtc: RtcClock,
}

impl<F: FileSystem, M: Machine> Kernel<F, M> {
    pub fn new(fs: F, machine: M, config: BootConfig) -> Self {
        Self {
            fs,
            machine,
            config,
            space: AddressSpace::new(),
            procs: ProcessTable::new(),
            scheduler: Scheduler::new(),
            sessions: Sessions::new(),
            rtc: RtcClock::new(),
        }
    }

    /// Instala el directorio de páginas, abre la terminal 0 y carga su shell.
    ///
    /// El kernel debe estar ya en su dirección final: el directorio
    /// guarda la dirección física de las tablas de páginas que contiene.
    pub fn boot(&mut self) -> Result<Launch, ExecError> {
        info!(
            "boot: shell {:?}, timer {} Hz",
            self.config.shell, self.config.pit_hz
        );
        self.space.install(&mut self.machine);
        self.sessions.allocate(TerminalId::FIRST);
        self.sessions.show(TerminalId::FIRST, &mut self.machine);

        let shell = self.config.shell;
        self.spawn(shell.as_bytes(), Origin::Session(TerminalId::FIRST))
    }

    /// Interrupción periódica del RTC.
    pub fn rtc_tick(&mut self) {
        self.rtc.tick();
    }

    /// Contexto de operaciones de fichero de `slot` más su tabla de descriptores.
    pub(crate) fn file_io(&mut self, slot: Slot) -> (FileIo<'_>, &mut FileTable) {
        let pcb = self.procs.pcb_mut(slot);
        let terminal = pcb.terminal;
        let foreground = terminal == self.sessions.visible();
        let io = FileIo {
            fs: &self.fs,
            machine: &mut self.machine,
            terminal: self.sessions.terminal_mut(terminal),
            foreground,
            rtc: &self.rtc,
        };
        (io, &mut pcb.files)
    }

    // ------------------------------------------------------------------
    // Consultas
    // ------------------------------------------------------------------

    pub fn procs(&self) -> &ProcessTable {
        &self.procs
    }

    pub fn sessions(&self) -> &Sessions {
        &self.sessions
    }

    pub fn address_space(&self) -> &AddressSpace {
        &self.space
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    pub fn config(&self) -> &BootConfig {
        &self.config
    }

    pub fn fs(&self) -> &F {
        &self.fs
    }

    pub fn machine(&self) -> &M {
        &self.machine
    }

    pub fn machine_mut(&mut self) -> &mut M {
        &mut self.machine
    }
}
