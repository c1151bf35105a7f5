// ── Infrared codes with toggle state ──

use std::sync::atomic::{AtomicBool, Ordering};

/// Which half of a toggle pair goes out next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IrCodeState {
    Main,
    Alternate,
}

/// An infrared code, optionally paired with a toggle code.
///
/// Remotes with a toggle bit send a different signal on every other press
/// of the same button. [`next_code`](Self::next_code) returns the code to
/// send and advances the state, so the same instance must be reused across
/// presses; the code cache keeps one per button for that reason. Shared
/// instances advance atomically.
#[derive(Debug)]
pub struct IrCode {
    main: String,
    alternate: Option<String>,
    alternate_next: AtomicBool,
}

impl IrCode {
    /// A code that always sends `code`.
    pub fn new(code: impl Into<String>) -> Self {
        Self::with_toggle(code, None)
    }

    /// A code toggling between `main` and `alternate`, starting with `main`.
    pub fn with_toggle(main: impl Into<String>, alternate: Option<String>) -> Self {
        Self {
            main: main.into(),
            alternate,
            alternate_next: AtomicBool::new(false),
        }
    }

    pub fn main(&self) -> &str {
        &self.main
    }

    pub fn alternate(&self) -> Option<&str> {
        self.alternate.as_deref()
    }

    pub fn is_toggle(&self) -> bool {
        self.alternate.is_some()
    }

    /// The state the next call to [`next_code`](Self::next_code) sends from.
    pub fn state(&self) -> IrCodeState {
        if self.alternate_next.load(Ordering::Acquire) {
            IrCodeState::Alternate
        } else {
            IrCodeState::Main
        }
    }

    /// Return the code to send now and advance the toggle state.
    pub fn next_code(&self) -> &str {
        let Some(alternate) = self.alternate.as_deref() else {
            return &self.main;
        };

        if self.alternate_next.fetch_xor(true, Ordering::AcqRel) {
            alternate
        } else {
            &self.main
        }
    }
}
