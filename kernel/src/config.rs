// kernel/src/config.rs
//
// Layout fijo de memoria y límites del kernel, más las opciones que se
// pueden pasar por la línea de comandos de multiboot.

use log::{warn, LevelFilter};

use crate::fs::FileName;

// ============================================================================
// Límites
// ============================================================================

pub const MAX_PROCESSES: usize = 8;
pub const MAX_TERMINALS: usize = 3;
pub const MAX_FILES: usize = 8;
pub const FILENAME_LEN: usize = 32;

pub const SCREEN_COLS: usize = 80;
pub const SCREEN_ROWS: usize = 25;
pub const SCREEN_CELLS: usize = SCREEN_COLS * SCREEN_ROWS;

/// Buffer de línea de entrada; un byte queda libre para el terminador.
pub const LINE_BUFFER_SIZE: usize = 128;
pub const LINE_LIMIT: usize = LINE_BUFFER_SIZE - 1;

/// Línea de comando más larga que acepta `execute`, nombre y argumentos incluidos.
pub const COMMAND_MAX: usize = 128;
pub const ARGS_MAX: usize = 128;

// ============================================================================
// Memoria física y virtual
// ============================================================================

pub const PAGE_SIZE: u32 = 0x1000;
pub const LARGE_PAGE_SIZE: u32 = 0x40_0000;

/// Imagen del kernel, mapeada identidad como una página de 4 MiB.
pub const KERNEL_BASE: u32 = 0x40_0000;
/// Tope de la región del kernel; las pilas de kernel de los slots crecen hacia abajo desde aquí.
pub const KERNEL_REGION_END: u32 = 0x80_0000;
pub const KERNEL_STACK_SIZE: u32 = 0x2000;

/// Marco físico del slot 0; el slot `s` usa `PROCESS_FRAME_BASE + s * 4 MiB`.
pub const PROCESS_FRAME_BASE: u32 = 0x80_0000;

pub const USER_WINDOW_BASE: u32 = 0x0800_0000;
pub const USER_WINDOW_END: u32 = USER_WINDOW_BASE + LARGE_PAGE_SIZE;
pub const PROGRAM_LOAD_ADDR: u32 = 0x0804_8000;
pub const USER_STACK_TOP: u32 = USER_WINDOW_END - 4;

pub const VIDEO_PHYS: u32 = 0xB8000;
pub const VIDEO_ALIAS_ADDR: u32 = 0x0880_0000;
/// Páginas detrás del alias de vídeo de terminales en segundo plano, una por terminal.
pub const SCRATCH_VIDEO_BASE: u32 = 0x02C0_0000;

// ============================================================================
// Imágenes de programa
// ============================================================================

pub const ELF_MAGIC: [u8; 4] = [0x7F, b'E', b'L', b'F'];
pub const ENTRY_POINT_OFFSET: usize = 24;

/// Estado que recibe el padre cuando un proceso muere por una excepción de CPU.
pub const EXCEPTION_STATUS: u32 = 256;

// ============================================================================
// Relojes
// ============================================================================

pub const PIT_HZ: u32 = 40;
pub const PIT_MIN_HZ: u32 = 19;
pub const PIT_MAX_HZ: u32 = 1000;
pub const RTC_DEFAULT_HZ: u32 = 2;
pub const RTC_MAX_HZ: u32 = 1024;

pub const SHELL: &[u8] = b"shell";

// ============================================================================
// BootConfig
// ============================================================================

/// Opciones leídas de la línea de comando de multiboot.
///
/// La línea de comando es una lista de pares `clave=valor` separados por espacios:
/// `log=debug pit_hz=100 shell=shell`. Lo que no se entiende mantiene
/// el valor por defecto compilado.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BootConfig {
    pub log_level: LevelFilter,
    pub pit_hz: u32,
    pub shell: FileName,
}

impl Default for BootConfig {
    fn default() -> Self {
        Self {
            log_level: LevelFilter::Info,
            pit_hz: PIT_HZ,
            shell: FileName::from_static(SHELL),
        }
    }
}

impl BootConfig {
    pub fn parse(cmdline: &str) -> Self {
        let mut config = Self::default();

        for option in cmdline.split_ascii_whitespace() {
            let Some((key, value)) = option.split_once('=') else {
                // El primer token suele ser la ruta de la imagen
                continue;
            };
            match key {
                "log" => match parse_level(value) {
                    Some(level) => config.log_level = level,
                    None => warn!("boot: unknown log level {:?}", value),
                },
                "pit_hz" => match value.parse::<u32>() {
                    Ok(hz) if (PIT_MIN_HZ..=PIT_MAX_HZ).contains(&hz) => config.pit_hz = hz,
                    _ => warn!("boot: pit_hz {:?} out of range", value),
                },
                "shell" => match FileName::new(value.as_bytes()) {
                    Some(name) => config.shell = name,
                    None => warn!("boot: bad shell name {:?}", value),
                },
                _ => warn!("boot: ignoring option {:?}", key),
            }
        }

        config
    }
}

fn parse_level(value: &str) -> Option<LevelFilter> {
    let level = match value {
        "off" => LevelFilter::Off,
        "error" => LevelFilter::Error,
        "warn" => LevelFilter::Warn,
        "info" => LevelFilter::Info,
        "debug" => LevelFilter::Debug,
        "trace" => LevelFilter::Trace,
        _ => return None,
    };
    Some(level)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_command_line_keeps_defaults() {
        assert_eq!(BootConfig::parse(""), BootConfig::default());
        assert_eq!(BootConfig::parse("/boot/kernel"), BootConfig::default());
    }

    #[test]
    fn options_override_defaults() {
        let config = BootConfig::parse("/boot/kernel log=trace pit_hz=100 shell=sh2");
        assert_eq!(config.log_level, LevelFilter::Trace);
        assert_eq!(config.pit_hz, 100);
        assert_eq!(config.shell.as_bytes(), b"sh2");
    }

    #[test]
    fn malformed_values_are_ignored() {
        let config = BootConfig::parse("log=loud pit_hz=5 pit_hz=abc colour=blue");
        assert_eq!(config, BootConfig::default());

        let long = "shell=aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa";
        assert_eq!(BootConfig::parse(long).shell.as_bytes(), SHELL);
    }

    #[test]
    fn layout_constants_line_up() {
        assert_eq!(USER_WINDOW_BASE >> 22, 32);
        assert_eq!(VIDEO_ALIAS_ADDR >> 22, 34);
        assert_eq!(USER_STACK_TOP, 0x083F_FFFC);
        let last_frame_end = PROCESS_FRAME_BASE + LARGE_PAGE_SIZE * MAX_PROCESSES as u32;
        assert!(last_frame_end <= SCRATCH_VIDEO_BASE);
    }
}
