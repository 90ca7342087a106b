//! Call-site information attached to ledger operations.
use serde::Serialize;
use std::fmt;

/// The source location from which a ledger operation was issued.
///
/// Usually constructed with the [`provenance!`](crate::provenance) macro.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Provenance {
    pub file: &'static str,
    pub line: u32,
    pub function: &'static str,
}

impl Provenance {
    pub const fn new(file: &'static str, line: u32, function: &'static str) -> Self {
        Self { file, line, function }
    }

    /// Provenance for operations whose call site is not known.
    pub const fn unknown() -> Self {
        Self::new("<unknown>", 0, "<unknown>")
    }
}

impl Default for Provenance {
    fn default() -> Self {
        Self::unknown()
    }
}

impl fmt::Display for Provenance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}, func: {}", self.file, self.line, self.function)
    }
}

/// Captures the current source location as a [`Provenance`].
///
/// The function is approximated by the enclosing module path.
#[macro_export]
macro_rules! provenance {
    () => {
        $crate::Provenance::new(file!(), line!(), module_path!())
    };
}
