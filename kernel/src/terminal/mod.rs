// kernel/src/terminal/mod.rs
//
// Terminal de texto 80x25: buffer de pantalla propio, línea de entrada
// de 128 bytes y el proceso en primer plano. Sólo la terminal visible
// se vuelca a la pantalla física; las demás acumulan en su buffer.

use core::fmt;
use core::task::Poll;

use crate::config::{
    LINE_BUFFER_SIZE, LINE_LIMIT, MAX_TERMINALS, PAGE_SIZE, SCRATCH_VIDEO_BASE, SCREEN_CELLS,
    SCREEN_COLS, SCREEN_ROWS,
};
use crate::keyboard::InputEvent;
use crate::machine::Machine;
use crate::process::Slot;

pub mod session;

pub use session::Sessions;

const BLANK: u8 = b' ';

// ============================================================================
// TerminalId
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TerminalId(u8);

impl TerminalId {
    pub const FIRST: TerminalId = TerminalId(0);

    pub const fn new(index: usize) -> Option<Self> {
        if index < MAX_TERMINALS {
            Some(TerminalId(index as u8))
        } else {
            None
        }
    }

    pub const fn index(self) -> usize {
        self.0 as usize
    }

    /// Página detrás del alias de vídeo de los procesos de esta terminal mientras
    /// está en segundo plano.
    pub const fn scratch_page(self) -> u32 {
        SCRATCH_VIDEO_BASE + PAGE_SIZE * self.0 as u32
    }

    pub fn all() -> impl Iterator<Item = TerminalId> {
        (0..MAX_TERMINALS as u8).map(TerminalId)
    }
}

impl fmt::Display for TerminalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tty{}", self.0)
    }
}

// ============================================================================
// Line
// ============================================================================

/// Línea de entrada terminada: lo tecleado seguido de `'\n'`.
pub struct Line {
    bytes: [u8; LINE_BUFFER_SIZE],
    len: usize,
}

impl Line {
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes[..self.len]
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

// ============================================================================
// Terminal
// ============================================================================

pub struct Terminal {
    screen: [u8; SCREEN_CELLS],
    cursor: usize,
    line: [u8; LINE_BUFFER_SIZE],
    line_len: usize,
    /// Se pulsó Enter; la línea espera a un lector.
    line_ready: bool,
    /// Hay un proceso bloqueado en `read` sobre esta terminal.
    reading: bool,
    /// Proceso en primer plano de esta terminal.
    pub active: Option<Slot>,
    /// Filas cambiadas desde el último flush (inclusive).
    dirty: Option<(usize, usize)>,
}

impl Terminal {
    pub const fn new() -> Self {
        Self {
            screen: [BLANK; SCREEN_CELLS],
            cursor: 0,
            line: [0; LINE_BUFFER_SIZE],
            line_len: 0,
            line_ready: false,
            reading: false,
            active: None,
            dirty: None,
        }
    }

    /// Pantalla en blanco, entrada vacía y sin proceso.
    pub fn reset(&mut self) {
        *self = Self::new();
        self.dirty = Some((0, SCREEN_ROWS - 1));
    }

    // ------------------------------------------------------------------
    // Salida
    // ------------------------------------------------------------------

    pub fn write(&mut self, bytes: &[u8]) {
        for &byte in bytes {
            self.put(byte);
        }
    }

    fn put(&mut self, byte: u8) {
        match byte {
            b'\n' => self.newline(),
            b'\r' => {}
            _ => {
                self.screen[self.cursor] = byte;
                self.mark(self.cursor / SCREEN_COLS);
                self.cursor += 1;
                if self.cursor == SCREEN_CELLS {
                    self.scroll();
                }
            }
        }
    }

    fn newline(&mut self) {
        let row = self.cursor / SCREEN_COLS;
        if row + 1 == SCREEN_ROWS {
            self.scroll();
        } else {
            self.cursor = (row + 1) * SCREEN_COLS;
        }
    }

    fn scroll(&mut self) {
        self.screen.copy_within(SCREEN_COLS.., 0);
        self.screen[SCREEN_CELLS - SCREEN_COLS..].fill(BLANK);
        self.cursor = SCREEN_CELLS - SCREEN_COLS;
        self.dirty = Some((0, SCREEN_ROWS - 1));
    }

    fn erase_last(&mut self) {
        if self.cursor == 0 {
            return;
        }
        self.cursor -= 1;
        self.screen[self.cursor] = BLANK;
        self.mark(self.cursor / SCREEN_COLS);
    }

    pub fn clear_screen(&mut self) {
        self.screen.fill(BLANK);
        self.cursor = 0;
        self.dirty = Some((0, SCREEN_ROWS - 1));
    }

    fn mark(&mut self, row: usize) {
        self.dirty = Some(match self.dirty {
            Some((first, last)) => (first.min(row), last.max(row)),
            None => (row, row),
        });
    }

    /// Dibuja las filas cambiadas desde el último flush y mueve el cursor.
    pub fn flush(&mut self, machine: &mut dyn Machine) {
        if let Some((first, last)) = self.dirty.take() {
            for row in first..=last {
                let start = row * SCREEN_COLS;
                machine.render(start, &self.screen[start..start + SCREEN_COLS]);
            }
        }
        machine.move_cursor(self.cursor);
    }

    /// Dibuja el buffer entero, para una terminal que acaba de hacerse visible.
    pub fn redraw(&mut self, machine: &mut dyn Machine) {
        self.dirty = Some((0, SCREEN_ROWS - 1));
        self.flush(machine);
    }

    // ------------------------------------------------------------------
    // Entrada
    // ------------------------------------------------------------------

    /// Aplica una tecla decodificada. El cambio de terminal lo hace quien llama.
    pub fn handle_input(&mut self, event: InputEvent) {
        match event {
            InputEvent::Char(byte) => {
                if self.line_ready || self.line_len >= LINE_LIMIT {
                    return;
                }
                self.line[self.line_len] = byte;
                self.line_len += 1;
                self.put(byte);
            }
            InputEvent::Enter => {
                if !self.line_ready {
                    self.line_ready = true;
                    self.put(b'\n');
                }
            }
            InputEvent::Backspace => {
                if !self.line_ready && self.line_len > 0 {
                    self.line_len -= 1;
                    self.erase_last();
                }
            }
            InputEvent::ClearScreen => {
                self.clear_screen();
                if !self.line_ready {
                    self.line_len = 0;
                }
            }
            InputEvent::SwitchTerminal(_) => {}
        }
    }

    /// La línea terminada, como mucho `requested` caracteres más
    /// `'\n'`. Pendiente hasta que se pulsa Enter. La línea sigue en el buffer
    /// hasta `consume_line`.
    pub fn peek_line(&mut self, requested: usize) -> Poll<Line> {
        if !self.line_ready {
            self.reading = true;
            return Poll::Pending;
        }
        self.reading = false;

        let limit = self.line_len.min(requested);
        let mut line = Line {
            bytes: [0; LINE_BUFFER_SIZE],
            len: limit + 1,
        };
        line.bytes[..limit].copy_from_slice(&self.line[..limit]);
        line.bytes[limit] = b'\n';
        Poll::Ready(line)
    }

    /// Descarta la línea terminada cuando un lector ya la tiene.
    pub fn consume_line(&mut self) {
        if self.line_ready {
            self.line_len = 0;
            self.line_ready = false;
        }
    }

    pub fn is_reading(&self) -> bool {
        self.reading
    }

    pub fn pending_input(&self) -> &[u8] {
        &self.line[..self.line_len]
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Contenido de la fila sin blancos al final.
    pub fn row(&self, row: usize) -> &[u8] {
        let start = row * SCREEN_COLS;
        let cells = &self.screen[start..start + SCREEN_COLS];
        let end = cells.iter().rposition(|&b| b != BLANK).map_or(0, |i| i + 1);
        &cells[..end]
    }
}

impl Default for Terminal {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Write for Terminal {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.write(s.as_bytes());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockMachine;

    fn typed(terminal: &mut Terminal, text: &[u8]) {
        for &byte in text {
            terminal.handle_input(InputEvent::Char(byte));
        }
    }

    #[test]
    fn newline_and_carriage_return() {
        let mut terminal = Terminal::new();
        terminal.write(b"one\r\ntwo");
        assert_eq!(terminal.row(0), b"one");
        assert_eq!(terminal.row(1), b"two");
        assert_eq!(terminal.cursor(), SCREEN_COLS + 3);
    }

    #[test]
    fn long_lines_wrap_to_the_next_row() {
        let mut terminal = Terminal::new();
        terminal.write(&[b'a'; SCREEN_COLS + 2]);
        assert_eq!(terminal.row(0).len(), SCREEN_COLS);
        assert_eq!(terminal.row(1), b"aa");
    }

    #[test]
    fn bottom_row_scrolls_the_buffer_up() {
        let mut terminal = Terminal::new();
        for row in 0..SCREEN_ROWS {
            terminal.write(&[b'a' + row as u8]);
            terminal.write(b"\n");
        }
        // 25 saltos: la primera fila se fue y la última está en blanco
        assert_eq!(terminal.row(0), b"b");
        assert_eq!(terminal.row(SCREEN_ROWS - 2), &[b'a' + 24]);
        assert_eq!(terminal.row(SCREEN_ROWS - 1), b"");
        assert_eq!(terminal.cursor(), SCREEN_CELLS - SCREEN_COLS);

        terminal.write(&[b'z'; SCREEN_COLS]);
        assert_eq!(terminal.row(SCREEN_ROWS - 2), &[b'z'; SCREEN_COLS][..]);
        assert_eq!(terminal.cursor(), SCREEN_CELLS - SCREEN_COLS);
    }

    #[test]
    fn peek_line_truncates_and_terminates() {
        let mut terminal = Terminal::new();
        assert!(terminal.peek_line(4).is_pending());
        assert!(terminal.is_reading());

        typed(&mut terminal, b"abcdefgh");
        assert!(terminal.peek_line(4).is_pending());
        terminal.handle_input(InputEvent::Enter);

        let Poll::Ready(line) = terminal.peek_line(4) else {
            panic!("line should be ready");
        };
        assert_eq!(line.as_bytes(), b"abcd\n");
        assert_eq!(line.len(), 5);
        assert!(!terminal.is_reading());
        assert_eq!(terminal.pending_input(), b"abcdefgh");

        terminal.consume_line();
        assert!(terminal.pending_input().is_empty());
        assert!(terminal.peek_line(4).is_pending());
    }

    #[test]
    fn peek_line_shorter_than_request() {
        let mut terminal = Terminal::new();
        typed(&mut terminal, b"ls");
        terminal.handle_input(InputEvent::Enter);
        let Poll::Ready(line) = terminal.peek_line(100) else {
            panic!("line should be ready");
        };
        assert_eq!(line.as_bytes(), b"ls\n");
    }

    #[test]
    fn input_is_capped_at_127_characters() {
        let mut terminal = Terminal::new();
        typed(&mut terminal, &[b'x'; 200]);
        assert_eq!(terminal.pending_input().len(), LINE_LIMIT);
        terminal.handle_input(InputEvent::Enter);
        let Poll::Ready(line) = terminal.peek_line(1024) else {
            panic!("line should be ready");
        };
        assert_eq!(line.len(), LINE_BUFFER_SIZE);
    }

    #[test]
    fn backspace_only_erases_typed_characters() {
        let mut terminal = Terminal::new();
        terminal.write(b"$ ");
        typed(&mut terminal, b"ab");
        terminal.handle_input(InputEvent::Backspace);
        terminal.handle_input(InputEvent::Backspace);
        terminal.handle_input(InputEvent::Backspace);
        assert_eq!(terminal.row(0), b"$");
        assert_eq!(terminal.cursor(), 2);
        assert!(terminal.pending_input().is_empty());
    }

    #[test]
    fn keys_are_ignored_while_a_line_waits() {
        let mut terminal = Terminal::new();
        typed(&mut terminal, b"hi");
        terminal.handle_input(InputEvent::Enter);
        typed(&mut terminal, b"more");
        terminal.handle_input(InputEvent::Backspace);
        assert_eq!(terminal.pending_input(), b"hi");
        assert_eq!(terminal.row(1), b"");
    }

    #[test]
    fn ctrl_l_clears_screen_and_partial_line() {
        let mut terminal = Terminal::new();
        terminal.write(b"old output\n");
        typed(&mut terminal, b"half");
        terminal.handle_input(InputEvent::ClearScreen);
        assert_eq!(terminal.row(0), b"");
        assert_eq!(terminal.cursor(), 0);
        assert!(terminal.pending_input().is_empty());
    }

    #[test]
    fn flush_draws_only_dirty_rows() {
        let mut machine = MockMachine::new();
        let mut terminal = Terminal::new();
        terminal.write(b"\n\nhello");
        terminal.flush(&mut machine);
        assert_eq!(machine.rendered_rows, 1);
        assert_eq!(machine.screen_row(2), "hello");
        assert_eq!(machine.cursor, 2 * SCREEN_COLS + 5);

        terminal.flush(&mut machine);
        assert_eq!(machine.rendered_rows, 1);

        terminal.redraw(&mut machine);
        assert_eq!(machine.rendered_rows, 1 + SCREEN_ROWS);
    }

    #[test]
    fn fmt_write_goes_through_the_buffer() {
        use core::fmt::Write;
        let mut terminal = Terminal::new();
        write!(terminal, "pid {}", 3).unwrap();
        assert_eq!(terminal.row(0), b"pid 3");
    }

    #[test]
    fn terminal_ids_and_scratch_pages() {
        assert_eq!(TerminalId::all().count(), MAX_TERMINALS);
        assert!(TerminalId::new(MAX_TERMINALS).is_none());
        let pages: std::vec::Vec<u32> = TerminalId::all().map(TerminalId::scratch_page).collect();
        assert_eq!(pages, [0x02C0_0000, 0x02C0_1000, 0x02C0_2000]);
    }
}
