// kernel/src/fs.rs
//
// Contrato con el sistema de archivos de solo lectura y el parser de la
// imagen que carga el bootloader como módulo multiboot.
//
// Layout de la imagen (bloques de 4 KiB):
//
//   [boot block][inode 0]...[inode N-1][data 0]...[data D-1]
//
//   boot block: dir_count:u32 inode_count:u32 data_count:u32 reserved[52]
//               seguido de hasta 63 entradas de 64 bytes:
//               name[32] type:u32 inode:u32 reserved[24]
//   inode:      length:u32 block[1023]:u32

use core::fmt;

use crate::config::FILENAME_LEN;

pub const BLOCK_SIZE: usize = 4096;
pub const DENTRY_SIZE: usize = 64;
pub const MAX_DENTRIES: usize = BLOCK_SIZE / DENTRY_SIZE - 1;

const DENTRY_TYPE_OFFSET: usize = FILENAME_LEN;
const DENTRY_INODE_OFFSET: usize = FILENAME_LEN + 4;

// ============================================================================
// Tipos
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileType {
    Device,
    Directory,
    Regular,
}

impl FileType {
    pub fn from_raw(raw: u32) -> Option<Self> {
        match raw {
            0 => Some(Self::Device),
            1 => Some(Self::Directory),
            2 => Some(Self::Regular),
            _ => None,
        }
    }

    pub fn as_raw(self) -> u32 {
        match self {
            Self::Device => 0,
            Self::Directory => 1,
            Self::Regular => 2,
        }
    }
}

/// Nombre de fichero de hasta 32 bytes, guardado en línea.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct FileName {
    bytes: [u8; FILENAME_LEN],
    len: usize,
}

impl FileName {
    pub const EMPTY: FileName = FileName {
        bytes: [0; FILENAME_LEN],
        len: 0,
    };

    /// Rechaza nombres vacíos y de más de 32 bytes.
    pub fn new(name: &[u8]) -> Option<Self> {
        if name.is_empty() || name.len() > FILENAME_LEN {
            return None;
        }
        let mut bytes = [0; FILENAME_LEN];
        bytes[..name.len()].copy_from_slice(name);
        Some(Self {
            bytes,
            len: name.len(),
        })
    }

    /// Constructor que trunca, para nombres fijos en el código.
    pub fn from_static(name: &'static [u8]) -> Self {
        let len = name.len().min(FILENAME_LEN);
        let mut bytes = [0; FILENAME_LEN];
        bytes[..len].copy_from_slice(&name[..len]);
        Self { bytes, len }
    }

    /// Campo de nombre de una entrada en disco: relleno con NUL salvo si usa los 32 bytes.
    fn from_padded(raw: &[u8]) -> Self {
        let len = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());
        let mut bytes = [0; FILENAME_LEN];
        bytes[..len].copy_from_slice(&raw[..len]);
        Self { bytes, len }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes[..self.len]
    }
}

impl fmt::Debug for FileName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match core::str::from_utf8(self.as_bytes()) {
            Ok(name) => write!(f, "{:?}", name),
            Err(_) => write!(f, "{:?}", self.as_bytes()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dentry {
    pub name: FileName,
    pub file_type: FileType,
    pub inode: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FsError {
    NotFound,
    BadInode,
    Corrupt,
}

// ============================================================================
// TRAIT: FileSystem
// ============================================================================

/// Sistema de ficheros de sólo lectura del que el kernel carga programas y ficheros.
pub trait FileSystem {
    fn resolve_by_name(&self, name: &[u8]) -> Result<Dentry, FsError>;

    fn dentry_by_index(&self, index: usize) -> Result<Dentry, FsError>;

    fn size_of(&self, inode: u32) -> Result<u32, FsError>;

    /// Copia bytes del fichero desde `offset` a `buf`.
    /// Devuelve los bytes copiados, 0 en el fin de fichero o más allá.
    fn read_bytes(&self, inode: u32, offset: u32, buf: &mut [u8]) -> Result<usize, FsError>;
}

// ============================================================================
// BootFs
// ============================================================================

pub struct BootFs<'a> {
    image: &'a [u8],
    dentry_count: usize,
    inode_count: u32,
    data_count: u32,
}

impl<'a> BootFs<'a> {
    pub fn new(image: &'a [u8]) -> Result<Self, FsError> {
        let header = |index: usize| read_u32(image, index * 4).ok_or(FsError::Corrupt);
        let dentry_count = header(0)? as usize;
        let inode_count = header(1)?;
        let data_count = header(2)?;

        // En 32 bits unos contadores absurdos desbordan el cálculo
        let needed = (inode_count as usize)
            .checked_add(data_count as usize)
            .and_then(|blocks| blocks.checked_add(1))
            .and_then(|blocks| blocks.checked_mul(BLOCK_SIZE))
            .ok_or(FsError::Corrupt)?;
        if dentry_count > MAX_DENTRIES || image.len() < needed {
            return Err(FsError::Corrupt);
        }

        Ok(Self {
            image,
            dentry_count,
            inode_count,
            data_count,
        })
    }

    pub fn dentry_count(&self) -> usize {
        self.dentry_count
    }

    fn dentry_at(&self, index: usize) -> Result<Dentry, FsError> {
        let base = (index + 1) * DENTRY_SIZE;
        let raw = &self.image[base..base + DENTRY_SIZE];
        let file_type = read_u32(raw, DENTRY_TYPE_OFFSET)
            .and_then(FileType::from_raw)
            .ok_or(FsError::Corrupt)?;
        let inode = read_u32(raw, DENTRY_INODE_OFFSET).ok_or(FsError::Corrupt)?;
        Ok(Dentry {
            name: FileName::from_padded(&raw[..FILENAME_LEN]),
            file_type,
            inode,
        })
    }

    fn inode_block(&self, inode: u32) -> Result<&'a [u8], FsError> {
        if inode >= self.inode_count {
            return Err(FsError::BadInode);
        }
        let start = (1 + inode as usize) * BLOCK_SIZE;
        Ok(&self.image[start..start + BLOCK_SIZE])
    }

    fn data_block(&self, number: u32) -> Result<&'a [u8], FsError> {
        if number >= self.data_count {
            return Err(FsError::Corrupt);
        }
        let start = (1 + self.inode_count as usize + number as usize) * BLOCK_SIZE;
        Ok(&self.image[start..start + BLOCK_SIZE])
    }
}

impl FileSystem for BootFs<'_> {
    fn resolve_by_name(&self, name: &[u8]) -> Result<Dentry, FsError> {
        if name.is_empty() || name.len() > FILENAME_LEN {
            return Err(FsError::NotFound);
        }
        for index in 0..self.dentry_count {
            let dentry = self.dentry_at(index)?;
            if dentry.name.as_bytes() == name {
                return Ok(dentry);
            }
        }
        Err(FsError::NotFound)
    }

    fn dentry_by_index(&self, index: usize) -> Result<Dentry, FsError> {
        if index >= self.dentry_count {
            return Err(FsError::NotFound);
        }
        self.dentry_at(index)
    }

    fn size_of(&self, inode: u32) -> Result<u32, FsError> {
        let block = self.inode_block(inode)?;
        read_u32(block, 0).ok_or(FsError::Corrupt)
    }

    fn read_bytes(&self, inode: u32, offset: u32, buf: &mut [u8]) -> Result<usize, FsError> {
        let block = self.inode_block(inode)?;
        let length = read_u32(block, 0).ok_or(FsError::Corrupt)? as usize;
        let offset = offset as usize;
        if offset >= length {
            return Ok(0);
        }

        let wanted = buf.len().min(length - offset);
        let mut copied = 0;
        while copied < wanted {
            let position = offset + copied;
            let slot = 1 + position / BLOCK_SIZE;
            let number = read_u32(block, slot * 4).ok_or(FsError::Corrupt)?;
            let data = self.data_block(number)?;

            let within = position % BLOCK_SIZE;
            let chunk = (BLOCK_SIZE - within).min(wanted - copied);
            buf[copied..copied + chunk].copy_from_slice(&data[within..within + chunk]);
            copied += chunk;
        }
        Ok(copied)
    }
}

fn read_u32(bytes: &[u8], offset: usize) -> Option<u32> {
    let raw = bytes.get(offset..offset + 4)?;
    Some(u32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]))
}
