//! Explicit diagnostics/verbosity threading.
//!
//! `vmdktool` (the tool this crate's format engine is modeled on) used a
//! single process-wide counter that every function consulted to decide
//! whether to print tracing output, and printed non-fatal problems
//! (newline-detect mismatches, trailing bytes after EOS, unrecognized
//! marker types) straight to stderr as it went. Here that is an explicit
//! record threaded by `&mut` reference into each top-level operation:
//! a verbosity level the caller controls, and a list of warnings the
//! caller can inspect or print after the fact.

/// A non-fatal condition observed while inspecting or extracting a VMDK.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Warning {
    /// One of the four newline-detection bytes did not match its expected value.
    NewlineCheckFailed {
        field: &'static str,
        expected: u8,
        found: u8,
    },
    /// The streaming extractor kept reading markers after an EOS marker.
    ExtraAfterEos,
    /// A marker with `size == 0` carried a `type` this engine does not recognize.
    UnknownMarkerType(u32),
}

impl std::fmt::Display for Warning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Warning::NewlineCheckFailed {
                field,
                expected,
                found,
            } => write!(
                f,
                "{field}: FAIL (expected 0x{expected:02x}, found 0x{found:02x})"
            ),
            Warning::ExtraAfterEos => write!(f, "data present after EOS marker"),
            Warning::UnknownMarkerType(t) => write!(f, "unknown marker type {t}"),
        }
    }
}

/// Verbosity + accumulated warnings, threaded through the public operations
/// instead of a global counter.
#[derive(Debug, Clone, Default)]
pub struct Diagnostics {
    /// 0 = silent, 1 = summary tracing, 2+ = per-sector tracing.
    pub verbosity: u8,
    /// Non-fatal problems observed so far, in the order they were seen.
    pub warnings: Vec<Warning>,
}

impl Diagnostics {
    /// Create a `Diagnostics` at the given verbosity with no warnings yet.
    pub fn new(verbosity: u8) -> Self {
        Self {
            verbosity,
            warnings: Vec::new(),
        }
    }

    /// Record a non-fatal warning.
    pub fn warn(&mut self, warning: Warning) {
        self.warnings.push(warning);
    }

    /// True once per-operation tracing should be shown (`-d`).
    pub fn traced(&self) -> bool {
        self.verbosity >= 1
    }

    /// True once per-sector tracing should be shown (`-d -d`).
    pub fn verbose_traced(&self) -> bool {
        self.verbosity >= 2
    }
}
