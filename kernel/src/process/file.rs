// kernel/src/process/file.rs
// Descriptores de archivo: tabla fija de 8 entradas por proceso y el trait
// FileHandle que implementa cada tipo de objeto abierto.

use core::task::Poll;

use log::trace;

use crate::config::{FILENAME_LEN, LINE_BUFFER_SIZE, MAX_FILES};
use crate::drivers::{self, rtc::RtcClock};
use crate::fs::{FileSystem, FileType, FsError};
use crate::machine::{Machine, MemoryFault};
use crate::terminal::Terminal;

// ============================================================================
// ERRORES
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileError {
    /// Descriptor fuera de 0..=7, o uno que no se puede cerrar.
    BadDescriptor,
    NotOpen,
    NoFreeDescriptor,
    NotFound,
    /// Operación que ese tipo de objeto no tiene (write sobre stdin, ...).
    NotSupported,
    InvalidArgument,
    Fault,
}

pub type FileResult<T> = Result<T, FileError>;

impl From<MemoryFault> for FileError {
    fn from(_: MemoryFault) -> Self {
        FileError::Fault
    }
}

impl From<FsError> for FileError {
    fn from(err: FsError) -> Self {
        match err {
            FsError::NotFound => FileError::NotFound,
            FsError::BadInode | FsError::Corrupt => FileError::InvalidArgument,
        }
    }
}

// ============================================================================
// Contexto de E/S
// ============================================================================

/// Partes del kernel que puede tocar una operación de fichero.
pub struct FileIo<'a> {
    pub fs: &'a dyn FileSystem,
    pub machine: &'a mut dyn Machine,
    /// Terminal del proceso que llama.
    pub terminal: &'a mut Terminal,
    pub foreground: bool,
    pub rtc: &'a RtcClock,
}

/// Buffer de usuario ya validado dentro de la ventana del proceso.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UserBuffer {
    pub addr: u32,
    pub len: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Stdin,
    Stdout,
    Rtc,
    Directory,
    Regular,
}

// ============================================================================
// TRAIT: FileHandle
// ============================================================================

/// Operaciones de un tipo de objeto abierto. Las implementaciones no tienen
/// estado; el de cada descriptor vive en la [`FdEntry`].
pub trait FileHandle: Sync {
    fn kind(&self) -> FileKind;

    fn open(&self, _io: &mut FileIo<'_>, _entry: &mut FdEntry) -> FileResult<()> {
        Ok(())
    }

    /// `Poll::Pending` indica que el read espera a una interrupción y
    /// se reintentará.
    fn read(&self, io: &mut FileIo<'_>, entry: &mut FdEntry, buf: UserBuffer) -> FileResult<Poll<usize>>;

    fn write(&self, io: &mut FileIo<'_>, entry: &mut FdEntry, buf: UserBuffer) -> FileResult<usize>;

    fn close(&self, _io: &mut FileIo<'_>, _entry: &mut FdEntry) -> FileResult<()> {
        Ok(())
    }
}

// ============================================================================
// FdEntry / FileTable
// ============================================================================

#[derive(Clone, Copy)]
pub struct FdEntry {
    ops: &'static dyn FileHandle,
    /// Inodo en ficheros regulares, 0 en el resto.
    pub inode: u32,
    /// Offset en bytes, índice de directorio o foto del contador del RTC.
    pub position: u32,
    /// Hay un read bloqueante esperando en este descriptor.
    pub armed: bool,
}

impl FdEntry {
    pub fn new(ops: &'static dyn FileHandle, inode: u32) -> Self {
        Self {
            ops,
            inode,
            position: 0,
            armed: false,
        }
    }

    pub fn ops(&self) -> &'static dyn FileHandle {
        self.ops
    }

    pub fn kind(&self) -> FileKind {
        self.ops.kind()
    }
}

impl core::fmt::Debug for FdEntry {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("FdEntry")
            .field("kind", &self.kind())
            .field("inode", &self.inode)
            .field("position", &self.position)
            .finish()
    }
}

pub const STDIN_FD: usize = 0;
pub const STDOUT_FD: usize = 1;
const FIRST_FREE_FD: usize = 2;

#[derive(Debug)]
pub struct FileTable {
    entries: [Option<FdEntry>; MAX_FILES],
}

impl FileTable {
    pub const fn new() -> Self {
        Self {
            entries: [None; MAX_FILES],
        }
    }

    /// Tabla de un programa nuevo: sólo la consola de entrada y salida.
    pub fn install_console(&mut self) {
        self.entries = [None; MAX_FILES];
        self.entries[STDIN_FD] = Some(FdEntry::new(&STDIN, 0));
        self.entries[STDOUT_FD] = Some(FdEntry::new(&STDOUT, 0));
    }

    pub fn free_descriptor(&self) -> FileResult<usize> {
        (FIRST_FREE_FD..MAX_FILES)
            .find(|&fd| self.entries[fd].is_none())
            .ok_or(FileError::NoFreeDescriptor)
    }

    pub fn install(&mut self, fd: usize, entry: FdEntry) {
        self.entries[fd] = Some(entry);
    }

    pub fn get_mut(&mut self, fd: i32) -> FileResult<&mut FdEntry> {
        let index = usize::try_from(fd).map_err(|_| FileError::BadDescriptor)?;
        self.entries
            .get_mut(index)
            .ok_or(FileError::BadDescriptor)?
            .as_mut()
            .ok_or(FileError::NotOpen)
    }

    /// Quita un descriptor que abrió el propio programa (2..=7).
    pub fn remove(&mut self, fd: i32) -> FileResult<FdEntry> {
        let index = usize::try_from(fd).map_err(|_| FileError::BadDescriptor)?;
        if !(FIRST_FREE_FD..MAX_FILES).contains(&index) {
            return Err(FileError::BadDescriptor);
        }
        self.entries[index].take().ok_or(FileError::NotOpen)
    }

    /// Vacía la tabla y devuelve lo que estaba abierto, consola incluida.
    pub fn take_all(&mut self) -> [Option<FdEntry>; MAX_FILES] {
        core::mem::replace(&mut self.entries, [None; MAX_FILES])
    }

    pub fn is_open(&self, fd: usize) -> bool {
        self.entries.get(fd).is_some_and(Option::is_some)
    }
}

impl Default for FileTable {
    fn default() -> Self {
        Self::new()
    }
}

/// Resuelve `name` a una entrada de descriptor del tipo correcto.
///
/// Los dispositivos registrados ganan siempre y un `.` inicial es el
/// directorio; lo demás pasa por el sistema de ficheros y toma el tipo
/// de su entrada de directorio.
pub fn resolve(fs: &dyn FileSystem, name: &[u8]) -> FileResult<FdEntry> {
    if let Some(device) = drivers::open_device(name) {
        return Ok(FdEntry::new(device, 0));
    }
    if name.first() == Some(&b'.') {
        return Ok(FdEntry::new(&DIRECTORY, 0));
    }
    let dentry = fs.resolve_by_name(name)?;
    let entry = match dentry.file_type {
        FileType::Device => FdEntry::new(
            drivers::open_device(dentry.name.as_bytes()).ok_or(FileError::NotFound)?,
            0,
        ),
        FileType::Directory => FdEntry::new(&DIRECTORY, 0),
        FileType::Regular => FdEntry::new(&REGULAR, dentry.inode),
    };
    trace!("open: {:?} -> {:?}", dentry.name, entry.kind());
    Ok(entry)
}

// ============================================================================
// IMPLEMENTACIONES
// ============================================================================

pub struct Stdin;
pub struct Stdout;
pub struct DirectoryFile;
pub struct RegularFile;

pub static STDIN: Stdin = Stdin;
pub static STDOUT: Stdout = Stdout;
pub static DIRECTORY: DirectoryFile = DirectoryFile;
pub static REGULAR: RegularFile = RegularFile;

/// Tamaño del buffer intermedio entre memoria de usuario y kernel.
const CHUNK: usize = 512;

impl FileHandle for Stdin {
    fn kind(&self) -> FileKind {
        FileKind::Stdin
    }

    fn read(&self, io: &mut FileIo<'_>, _entry: &mut FdEntry, buf: UserBuffer) -> FileResult<Poll<usize>> {
        match io.terminal.peek_line(buf.len as usize) {
            Poll::Pending => Ok(Poll::Pending),
            Poll::Ready(line) => {
                // Si la copia falla la línea sigue ahí para el próximo read
                io.machine.copy_to_user(buf.addr, line.as_bytes())?;
                io.terminal.consume_line();
                Ok(Poll::Ready(line.len()))
            }
        }
    }

    fn write(&self, _io: &mut FileIo<'_>, _entry: &mut FdEntry, _buf: UserBuffer) -> FileResult<usize> {
        Err(FileError::NotSupported)
    }
}

impl FileHandle for Stdout {
    fn kind(&self) -> FileKind {
        FileKind::Stdout
    }

    fn read(&self, _io: &mut FileIo<'_>, _entry: &mut FdEntry, _buf: UserBuffer) -> FileResult<Poll<usize>> {
        Err(FileError::NotSupported)
    }

    fn write(&self, io: &mut FileIo<'_>, _entry: &mut FdEntry, buf: UserBuffer) -> FileResult<usize> {
        let mut chunk = [0u8; LINE_BUFFER_SIZE];
        let total = buf.len as usize;
        let mut done = 0;
        while done < total {
            let len = chunk.len().min(total - done);
            io.machine.copy_from_user(buf.addr + done as u32, &mut chunk[..len])?;
            io.terminal.write(&chunk[..len]);
            done += len;
        }
        if io.foreground {
            io.terminal.flush(io.machine);
        }
        Ok(total)
    }
}

impl FileHandle for DirectoryFile {
    fn kind(&self) -> FileKind {
        FileKind::Directory
    }

    fn read(&self, io: &mut FileIo<'_>, entry: &mut FdEntry, buf: UserBuffer) -> FileResult<Poll<usize>> {
        // Un read vacío no se salta ninguna entrada
        if buf.len == 0 {
            return Ok(Poll::Ready(0));
        }
        let dentry = match io.fs.dentry_by_index(entry.position as usize) {
            Ok(dentry) => dentry,
            Err(FsError::NotFound) => return Ok(Poll::Ready(0)),
            Err(err) => return Err(err.into()),
        };
        let name = dentry.name.as_bytes();
        let len = name.len().min(buf.len as usize).min(FILENAME_LEN);
        io.machine.copy_to_user(buf.addr, &name[..len])?;
        entry.position += 1;
        Ok(Poll::Ready(len))
    }

    fn write(&self, _io: &mut FileIo<'_>, _entry: &mut FdEntry, _buf: UserBuffer) -> FileResult<usize> {
        Err(FileError::NotSupported)
    }
}

impl FileHandle for RegularFile {
    fn kind(&self) -> FileKind {
        FileKind::Regular
    }

    fn read(&self, io: &mut FileIo<'_>, entry: &mut FdEntry, buf: UserBuffer) -> FileResult<Poll<usize>> {
        let mut chunk = [0u8; CHUNK];
        let total = buf.len as usize;
        let mut done = 0;
        while done < total {
            let want = chunk.len().min(total - done);
            let got = io.fs.read_bytes(entry.inode, entry.position, &mut chunk[..want])?;
            if got == 0 {
                break;
            }
            io.machine.copy_to_user(buf.addr + done as u32, &chunk[..got])?;
            entry.position += got as u32;
            done += got;
            if got < want {
                break;
            }
        }
        Ok(Poll::Ready(done))
    }

    fn write(&self, _io: &mut FileIo<'_>, _entry: &mut FdEntry, _buf: UserBuffer) -> FileResult<usize> {
        Err(FileError::NotSupported)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::USER_WINDOW_BASE;
    use crate::drivers::rtc::RTC;
    use crate::fs::BootFs;
    use crate::mock::{ImageBuilder, MockMachine};

    struct Rig {
        image: std::vec::Vec<u8>,
        machine: MockMachine,
        terminal: Terminal,
        rtc: RtcClock,
    }

    impl Rig {
        fn new() -> Self {
            let image = ImageBuilder::new()
                .directory(b".")
                .device(b"rtc")
                .file(b"hello.txt", b"hello, world")
                .build();
            let mut machine = MockMachine::new();
            machine.map_window(WINDOW_FRAME);
            Self {
                image,
                machine,
                terminal: Terminal::new(),
                rtc: RtcClock::new(),
            }
        }

        fn run<R>(&mut self, f: impl FnOnce(&mut FileIo<'_>) -> R) -> R {
            let fs = BootFs::new(&self.image).unwrap();
            let mut io = FileIo {
                fs: &fs,
                machine: &mut self.machine,
                terminal: &mut self.terminal,
                foreground: true,
                rtc: &self.rtc,
            };
            f(&mut io)
        }
    }

    const WINDOW_FRAME: u32 = 0x80_0000;

    const BUF: UserBuffer = UserBuffer {
        addr: USER_WINDOW_BASE + 0x100,
        len: 64,
    };

    #[test]
    fn console_descriptors_reject_the_wrong_direction() {
        let mut rig = Rig::new();
        let mut table = FileTable::new();
        table.install_console();

        let mut stdin = *table.get_mut(0).unwrap();
        let mut stdout = *table.get_mut(1).unwrap();
        rig.run(|io| {
            assert_eq!(stdin.ops().write(io, &mut stdin, BUF), Err(FileError::NotSupported));
            assert_eq!(stdout.ops().read(io, &mut stdout, BUF), Err(FileError::NotSupported));
        });
    }

    #[test]
    fn table_limits_and_close_rules() {
        let mut table = FileTable::new();
        table.install_console();
        assert_eq!(table.get_mut(8).err(), Some(FileError::BadDescriptor));
        assert_eq!(table.get_mut(-1).err(), Some(FileError::BadDescriptor));
        assert_eq!(table.get_mut(2).err(), Some(FileError::NotOpen));
        assert_eq!(table.remove(0).err(), Some(FileError::BadDescriptor));
        assert_eq!(table.remove(1).err(), Some(FileError::BadDescriptor));

        for fd in 2..MAX_FILES {
            assert_eq!(table.free_descriptor(), Ok(fd));
            table.install(fd, FdEntry::new(&DIRECTORY, 0));
        }
        assert_eq!(table.free_descriptor(), Err(FileError::NoFreeDescriptor));
        assert!(table.remove(5).is_ok());
        assert_eq!(table.remove(5).err(), Some(FileError::NotOpen));
        assert_eq!(table.free_descriptor(), Ok(5));

        let open = table.take_all().iter().filter(|e| e.is_some()).count();
        assert_eq!(open, 7);
        assert!(!table.is_open(0));
    }

    #[test]
    fn resolve_picks_kind_from_name_and_dentry() {
        let rig = Rig::new();
        let fs = BootFs::new(&rig.image).unwrap();
        assert_eq!(resolve(&fs, b"rtc").unwrap().kind(), FileKind::Rtc);
        assert_eq!(resolve(&fs, b".").unwrap().kind(), FileKind::Directory);
        let file = resolve(&fs, b"hello.txt").unwrap();
        assert_eq!(file.kind(), FileKind::Regular);
        assert_eq!(resolve(&fs, b"missing").err(), Some(FileError::NotFound));
    }

    #[test]
    fn regular_reads_advance_the_offset() {
        let mut rig = Rig::new();
        let fs = BootFs::new(&rig.image).unwrap();
        let mut entry = resolve(&fs, b"hello.txt").unwrap();
        drop(fs);

        let small = UserBuffer { len: 5, ..BUF };
        rig.run(|io| {
            assert_eq!(entry.ops().read(io, &mut entry, small), Ok(Poll::Ready(5)));
            assert_eq!(entry.ops().read(io, &mut entry, BUF), Ok(Poll::Ready(7)));
            assert_eq!(entry.ops().read(io, &mut entry, BUF), Ok(Poll::Ready(0)));
            assert_eq!(entry.ops().write(io, &mut entry, BUF), Err(FileError::NotSupported));
        });
        assert_eq!(entry.position, 12);
        assert_eq!(rig.machine.read_user(BUF.addr, 7), b", world");
    }

    #[test]
    fn directory_reads_one_name_per_call() {
        let mut rig = Rig::new();
        let mut entry = FdEntry::new(&DIRECTORY, 0);
        let names: std::vec::Vec<std::vec::Vec<u8>> = rig.run(|io| {
            let mut names = std::vec::Vec::new();
            while let Ok(Poll::Ready(n)) = entry.ops().read(io, &mut entry, BUF) {
                if n == 0 {
                    break;
                }
                let mut name = std::vec![0u8; n];
                io.machine.copy_from_user(BUF.addr, &mut name).unwrap();
                names.push(name);
            }
            names
        });
        assert_eq!(names, [b".".to_vec(), b"rtc".to_vec(), b"hello.txt".to_vec()]);
    }

    #[test]
    fn rtc_read_waits_for_the_next_tick() {
        let mut rig = Rig::new();
        let mut entry = FdEntry::new(&RTC, 0);

        let first = rig.run(|io| entry.ops().read(io, &mut entry, BUF));
        assert_eq!(first, Ok(Poll::Pending));
        let retry = rig.run(|io| entry.ops().read(io, &mut entry, BUF));
        assert_eq!(retry, Ok(Poll::Pending));

        rig.rtc.tick();
        let done = rig.run(|io| entry.ops().read(io, &mut entry, BUF));
        assert_eq!(done, Ok(Poll::Ready(0)));
        assert!(!entry.armed);
    }

    #[test]
    fn rtc_write_accepts_powers_of_two_only() {
        let mut rig = Rig::new();
        let mut entry = FdEntry::new(&RTC, 0);
        let four = UserBuffer { len: 4, ..BUF };

        rig.run(|io| entry.ops().open(io, &mut entry)).unwrap();
        assert_eq!(rig.machine.rtc_rate, Some(15));

        rig.machine.write_user(BUF.addr, &1024u32.to_le_bytes());
        assert_eq!(rig.run(|io| entry.ops().write(io, &mut entry, four)), Ok(0));
        assert_eq!(rig.machine.rtc_rate, Some(6));

        for bad in [0u32, 1, 3, 100, 2048] {
            rig.machine.write_user(BUF.addr, &bad.to_le_bytes());
            let result = rig.run(|io| entry.ops().write(io, &mut entry, four));
            assert_eq!(result, Err(FileError::InvalidArgument), "{}", bad);
        }
        let short = UserBuffer { len: 2, ..BUF };
        assert_eq!(rig.run(|io| entry.ops().write(io, &mut entry, short)), Err(FileError::InvalidArgument));
        assert_eq!(rig.machine.rtc_rate, Some(6));
    }

    #[test]
    fn stdout_writes_reach_the_terminal() {
        let mut rig = Rig::new();
        let mut entry = FdEntry::new(&STDOUT, 0);
        rig.machine.write_user(BUF.addr, b"hi\n");
        let buf = UserBuffer { len: 3, ..BUF };
        assert_eq!(rig.run(|io| entry.ops().write(io, &mut entry, buf)), Ok(3));
        assert_eq!(rig.terminal.row(0), b"hi");
        assert_eq!(rig.machine.screen_row(0), "hi");
    }
}
