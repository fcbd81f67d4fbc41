//! Key bindings and macros

use crate::input::KeyBits;
use crate::keymap::{default_scan, N_KEYS_INPUT};

/// Maximum number of macros per mode
pub const MACRO_MAX: usize = 1024;

/// Action id bound to an input position (platform scancode)
pub type ActionId = u16;

/// One step of a macro
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MacroAction {
    /// Press or release a scancode
    Key { scan: ActionId, down: bool },
    /// Relative mouse movement
    Move { dx: i16, dy: i16 },
}

/// Key macro
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyMacro {
    /// Input positions that must all be held
    pub combo: KeyBits,
    pub actions: Vec<MacroAction>,
    /// Set while the combo stays held after firing
    pub triggered: bool,
}

impl KeyMacro {
    pub fn new(combo: KeyBits, actions: Vec<MacroAction>) -> Self {
        Self {
            combo,
            actions,
            triggered: false,
        }
    }
}

/// Key bindings for a mode (keyboard + mouse)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Binding {
    /// Action per input position, `None` when unbound
    pub base: [Option<ActionId>; N_KEYS_INPUT],
    pub macros: Vec<KeyMacro>,
}

impl Default for Binding {
    fn default() -> Self {
        let mut base = [None; N_KEYS_INPUT];
        for (position, slot) in base.iter_mut().enumerate() {
            *slot = default_scan(position);
        }
        Self {
            base,
            macros: Vec::new(),
        }
    }
}

impl Binding {
    /// Action currently bound to a position
    pub fn action(&self, position: usize) -> Option<ActionId> {
        self.base.get(position).copied().flatten()
    }

    pub fn bind(&mut self, position: usize, action: ActionId) {
        if let Some(slot) = self.base.get_mut(position) {
            *slot = Some(action);
        }
    }

    pub fn unbind(&mut self, position: usize) {
        if let Some(slot) = self.base.get_mut(position) {
            *slot = None;
        }
    }

    /// Restore the default action of a position
    pub fn rebind(&mut self, position: usize) {
        if let Some(slot) = self.base.get_mut(position) {
            *slot = default_scan(position);
        }
    }

    /// Add a macro, replacing one with the same combo
    ///
    /// Returns false when the macro list is full.
    pub fn add_macro(&mut self, key_macro: KeyMacro) -> bool {
        if let Some(existing) = self.macros.iter_mut().find(|m| m.combo == key_macro.combo) {
            *existing = key_macro;
            return true;
        }
        if self.macros.len() >= MACRO_MAX {
            return false;
        }
        self.macros.push(key_macro);
        true
    }

    pub fn clear_macros(&mut self) {
        self.macros.clear();
    }
}
