// kernel/src/drivers/rtc.rs
//
// Lado del núcleo del RTC: contador de ticks, conversión frecuencia ->
// código de rate y las operaciones del descriptor `rtc`. La programación
// del chip CMOS está en `drivers::cmos`.

use core::task::Poll;

use crate::config::{RTC_DEFAULT_HZ, RTC_MAX_HZ};
use crate::process::file::{FdEntry, FileError, FileHandle, FileIo, FileKind, FileResult, UserBuffer};

/// Código de frecuencia de los 2 Hz por defecto.
pub const DEFAULT_RATE: u8 = 15;

/// Contador de interrupciones periódicas. Los lectores comparan fotos de él.
#[derive(Debug, Default)]
pub struct RtcClock {
    ticks: u32,
}

impl RtcClock {
    pub const fn new() -> Self {
        Self { ticks: 0 }
    }

    pub fn tick(&mut self) {
        self.ticks = self.ticks.wrapping_add(1);
    }

    pub fn ticks(&self) -> u32 {
        self.ticks
    }
}

/// Código de frecuencia para `frequency`: potencia de dos entre 2 y 1024 Hz.
///
/// El chip divide 32768 Hz entre `2^(rate - 1)`, así que `rate = 16 - log2(f)`.
pub fn rate_for(frequency: u32) -> Option<u8> {
    if !frequency.is_power_of_two() || !(RTC_DEFAULT_HZ..=RTC_MAX_HZ).contains(&frequency) {
        return None;
    }
    Some(16 - frequency.trailing_zeros() as u8)
}

pub struct RtcDevice;

pub static RTC: RtcDevice = RtcDevice;

impl FileHandle for RtcDevice {
    fn kind(&self) -> FileKind {
        FileKind::Rtc
    }

    fn open(&self, io: &mut FileIo<'_>, _entry: &mut FdEntry) -> FileResult<()> {
        io.machine.set_rtc_rate(DEFAULT_RATE);
        Ok(())
    }

    /// Espera al primer tick posterior al inicio del read.
    fn read(&self, io: &mut FileIo<'_>, entry: &mut FdEntry, _buf: UserBuffer) -> FileResult<Poll<usize>> {
        if !entry.armed {
            entry.armed = true;
            entry.position = io.rtc.ticks();
            return Ok(Poll::Pending);
        }
        if io.rtc.ticks() == entry.position {
            return Ok(Poll::Pending);
        }
        entry.armed = false;
        Ok(Poll::Ready(0))
    }

    /// Recibe una frecuencia de 4 bytes en little-endian.
    fn write(&self, io: &mut FileIo<'_>, _entry: &mut FdEntry, buf: UserBuffer) -> FileResult<usize> {
        if buf.len != 4 {
            return Err(FileError::InvalidArgument);
        }
        let mut raw = [0u8; 4];
        io.machine.copy_from_user(buf.addr, &mut raw)?;
        let rate = rate_for(u32::from_le_bytes(raw)).ok_or(FileError::InvalidArgument)?;
        io.machine.set_rtc_rate(rate);
        Ok(0)
    }
}
