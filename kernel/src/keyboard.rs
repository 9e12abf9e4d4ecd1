// kernel/src/keyboard.rs
//
// Decodificación de scancodes (set 1, layout US) a eventos de terminal.
// El estado de modificadores (Shift, Ctrl, Caps) lo lleva pc-keyboard.

use pc_keyboard::{layouts, DecodedKey, HandleControl, KeyCode, Keyboard, ScancodeSet1};

/// Lo que significa una pulsación para la capa de terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputEvent {
    Char(u8),
    Enter,
    Backspace,
    /// Ctrl-L
    ClearScreen,
    /// F1..F3, desde cero.
    SwitchTerminal(usize),
}

pub struct Decoder {
    keyboard: Keyboard<layouts::Us104Key, ScancodeSet1>,
}

impl Decoder {
    pub fn new() -> Self {
        Self {
            keyboard: Keyboard::new(
                ScancodeSet1::new(),
                layouts::Us104Key,
                HandleControl::MapLettersToUnicode,
            ),
        }
    }

    /// Procesa un byte del puerto 0x60. Las liberaciones, los modificadores y el
    /// primer byte de las secuencias extendidas no producen nada.
    pub fn feed(&mut self, scancode: u8) -> Option<InputEvent> {
        let event = self.keyboard.add_byte(scancode).ok()??;
        let key = self.keyboard.process_keyevent(event)?;
        translate(key)
    }
}

impl Default for Decoder {
    fn default() -> Self {
        Self::new()
    }
}

fn translate(key: DecodedKey) -> Option<InputEvent> {
    match key {
        DecodedKey::Unicode('\n') => Some(InputEvent::Enter),
        DecodedKey::Unicode('\u{8}') => Some(InputEvent::Backspace),
        DecodedKey::Unicode('\u{c}') => Some(InputEvent::ClearScreen),
        DecodedKey::Unicode(c) if c == ' ' || c.is_ascii_graphic() => {
            Some(InputEvent::Char(c as u8))
        }
        DecodedKey::Unicode(_) => None,
        DecodedKey::RawKey(KeyCode::F1) => Some(InputEvent::SwitchTerminal(0)),
        DecodedKey::RawKey(KeyCode::F2) => Some(InputEvent::SwitchTerminal(1)),
        DecodedKey::RawKey(KeyCode::F3) => Some(InputEvent::SwitchTerminal(2)),
        DecodedKey::RawKey(_) => None,
    }
}
