// kernel/src/process/syscall.rs
//
// Dispatcher de syscalls (int 0x80). eax = número, ebx/ecx/edx = args.
// Cualquier error llega al programa como -1; el motivo sólo queda en el log.

use core::task::Poll;

use log::{debug, trace};

use super::context::{SaveTo, Transfer};
use super::file::{self, FdEntry, FileError, FileHandle, FileIo, FileResult, UserBuffer};
use super::{ExecError, Slot};
use crate::config::{COMMAND_MAX, FILENAME_LEN, USER_WINDOW_END, VIDEO_ALIAS_ADDR};
use crate::fs::FileSystem;
use crate::kernel::Kernel;
use crate::machine::{Machine, MemoryFault};
use crate::memory::user_window_contains;

/// Números de llamada estables de la ABI de programas.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum SyscallNumber {
    Halt = 1,
    Execute = 2,
    Read = 3,
    Write = 4,
    Open = 5,
    Close = 6,
    GetArgs = 7,
    Vidmap = 8,
    SetHandler = 9,
    Sigreturn = 10,
}

impl SyscallNumber {
    pub fn from_u32(n: u32) -> Option<Self> {
        match n {
            1 => Some(Self::Halt),
            2 => Some(Self::Execute),
            3 => Some(Self::Read),
            4 => Some(Self::Write),
            5 => Some(Self::Open),
            6 => Some(Self::Close),
            7 => Some(Self::GetArgs),
            8 => Some(Self::Vidmap),
            9 => Some(Self::SetHandler),
            10 => Some(Self::Sigreturn),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyscallError {
    UnknownCall(u32),
    /// Número conocido sin implementación (señales).
    Unsupported(SyscallNumber),
    /// Puntero de usuario fuera de la ventana del proceso.
    Fault,
    NoProcess,
    NoArguments,
    BufferTooSmall,
    File(FileError),
    Exec(ExecError),
}

impl From<FileError> for SyscallError {
    fn from(err: FileError) -> Self {
        SyscallError::File(err)
    }
}

impl From<ExecError> for SyscallError {
    fn from(err: ExecError) -> Self {
        SyscallError::Exec(err)
    }
}

impl From<MemoryFault> for SyscallError {
    fn from(_: MemoryFault) -> Self {
        SyscallError::Fault
    }
}

/// Resultado de una syscall.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    /// Valor para eax.
    Complete(i32),
    /// Bloqueada; se reintenta la misma llamada tras la próxima interrupción.
    Pending,
    /// La llamada sale del proceso actual (halt, execute).
    Transfer(Transfer),
}

fn user_range(addr: u32, len: u32) -> Result<UserBuffer, SyscallError> {
    if !user_window_contains(addr, len) {
        return Err(SyscallError::Fault);
    }
    Ok(UserBuffer { addr, len })
}

impl<F: FileSystem, M: Machine> Kernel<F, M> {
    pub fn syscall(&mut self, number: u32, arg1: u32, arg2: u32, arg3: u32) -> Dispatch {
        trace!("syscall {} ({:#x}, {:#x}, {:#x})", number, arg1, arg2, arg3);
        match self.dispatch(number, arg1, arg2, arg3) {
            Ok(done) => done,
            Err(err) => {
                debug!("syscall {} failed: {:?}", number, err);
                Dispatch::Complete(-1)
            }
        }
    }

    fn dispatch(&mut self, number: u32, arg1: u32, arg2: u32, arg3: u32) -> Result<Dispatch, SyscallError> {
        let call = SyscallNumber::from_u32(number).ok_or(SyscallError::UnknownCall(number))?;
        let slot = self.procs.current().ok_or(SyscallError::NoProcess)?;

        match call {
            SyscallNumber::Halt => self
                .halt(arg1 & 0xFF)
                .map(Dispatch::Transfer)
                .ok_or(SyscallError::NoProcess),
            SyscallNumber::Execute => self.sys_execute(arg1),
            SyscallNumber::Read => {
                let buf = user_range(arg2, arg3)?;
                let read = self.with_file(slot, arg1 as i32, |ops, io, entry| ops.read(io, entry, buf))?;
                Ok(match read {
                    Poll::Ready(n) => Dispatch::Complete(n as i32),
                    Poll::Pending => Dispatch::Pending,
                })
            }
            SyscallNumber::Write => {
                let buf = user_range(arg2, arg3)?;
                let written = self.with_file(slot, arg1 as i32, |ops, io, entry| ops.write(io, entry, buf))?;
                Ok(Dispatch::Complete(written as i32))
            }
            SyscallNumber::Open => self.sys_open(slot, arg1),
            SyscallNumber::Close => {
                let (mut io, files) = self.file_io(slot);
                let mut entry = files.remove(arg1 as i32)?;
                entry.ops().close(&mut io, &mut entry)?;
                Ok(Dispatch::Complete(0))
            }
            SyscallNumber::GetArgs => self.sys_getargs(slot, arg1, arg2),
            SyscallNumber::Vidmap => {
                let out = user_range(arg1, 4)?;
                self.refresh_video_alias();
                self.machine.copy_to_user(out.addr, &VIDEO_ALIAS_ADDR.to_le_bytes())?;
                Ok(Dispatch::Complete(VIDEO_ALIAS_ADDR as i32))
            }
            SyscallNumber::SetHandler | SyscallNumber::Sigreturn => {
                Err(SyscallError::Unsupported(call))
            }
        }
    }

    fn sys_execute(&mut self, command: u32) -> Result<Dispatch, SyscallError> {
        let mut raw = [0u8; COMMAND_MAX];
        let line = self.user_string(command, &mut raw)?;
        let launch = self.execute(line)?;
        Ok(Dispatch::Transfer(Transfer::Enter {
            save: SaveTo::Caller(launch.slot),
            launch,
        }))
    }

    fn sys_open(&mut self, slot: Slot, name: u32) -> Result<Dispatch, SyscallError> {
        let mut raw = [0u8; FILENAME_LEN + 1];
        let name = self.user_string(name, &mut raw)?;
        if name.is_empty() || name.len() > FILENAME_LEN {
            return Err(FileError::NotFound.into());
        }

        let mut entry = file::resolve(&self.fs, name)?;
        let (mut io, files) = self.file_io(slot);
        let fd = files.free_descriptor()?;
        entry.ops().open(&mut io, &mut entry)?;
        files.install(fd, entry);
        debug!("open: {:?} as fd {} in {}", entry.kind(), fd, slot);
        Ok(Dispatch::Complete(fd as i32))
    }

    fn sys_getargs(&mut self, slot: Slot, addr: u32, len: u32) -> Result<Dispatch, SyscallError> {
        let buf = user_range(addr, len)?;
        let args = self.procs.pcb(slot).args();
        if args.is_empty() {
            return Err(SyscallError::NoArguments);
        }
        if args.len() + 1 > buf.len as usize {
            return Err(SyscallError::BufferTooSmall);
        }
        self.machine.copy_to_user(buf.addr, args)?;
        self.machine.copy_to_user(buf.addr + args.len() as u32, &[0])?;
        Ok(Dispatch::Complete(0))
    }

    /// Copia una cadena terminada en NUL desde memoria de usuario. Para en el
    /// NUL, al final de `buf` o al final de la ventana del proceso.
    fn user_string<'b>(&mut self, addr: u32, buf: &'b mut [u8]) -> Result<&'b [u8], SyscallError> {
        if !user_window_contains(addr, 1) {
            return Err(SyscallError::Fault);
        }
        let len = buf.len().min((USER_WINDOW_END - addr) as usize);
        self.machine.copy_from_user(addr, &mut buf[..len])?;
        let end = buf[..len].iter().position(|&b| b == 0).unwrap_or(len);
        Ok(&buf[..end])
    }

    fn with_file<R>(
        &mut self,
        slot: Slot,
        fd: i32,
        op: impl FnOnce(&'static dyn FileHandle, &mut FileIo<'_>, &mut FdEntry) -> FileResult<R>,
    ) -> Result<R, SyscallError> {
        let (mut io, files) = self.file_io(slot);
        let entry = files.get_mut(fd)?;
        Ok(op(entry.ops(), &mut io, entry)?)
    }
}
