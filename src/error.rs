//! Errors reported by the memory ledger.
//!
//! With the exception of [`LedgerError::Device`], every error indicates misuse of the ledger's
//! lifetime tracking by the caller, not a transient condition. None of them are worth retrying.
use crate::provenance::Provenance;
use std::error::Error;
use std::fmt;

#[derive(Debug)]
#[non_exhaustive]
pub enum LedgerError {
    /// A null pointer was passed for registration.
    NullAddress { provenance: Provenance },
    /// The address is already registered as the base of a tracked allocation.
    AlreadyTracked {
        address: usize,
        bytes: usize,
        provenance: Provenance,
        existing_bytes: usize,
        existing: Provenance,
    },
    /// The requested region overlaps a tracked allocation.
    Overlapping {
        address: usize,
        bytes: usize,
        provenance: Provenance,
        existing_address: usize,
        existing_bytes: usize,
        existing: Provenance,
    },
    /// Erase of an address that was never registered while executing on the device.
    UntrackedErase { address: usize, provenance: Provenance },
    /// The address is neither tracked, a known alias, nor inside a tracked allocation.
    UnknownAddress { address: usize },
    /// The operation requires the base address of a tracked allocation.
    NotTracked { address: usize },
    /// A transfer would exceed the bounds of its allocation.
    OutOfBounds {
        address: usize,
        offset: usize,
        bytes: usize,
        allocation_bytes: usize,
    },
    InvalidConfig(String),
    /// The ledger's internal state does not satisfy its invariants.
    InvariantViolation(String),
    /// The device backend failed.
    Device(eyre::Report),
}

impl fmt::Display for LedgerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NullAddress { provenance } => {
                write!(f, "Trying to insert a null pointer ({})", provenance)
            }
            Self::AlreadyTracked {
                address,
                bytes,
                provenance,
                existing_bytes,
                existing,
            } => {
                write!(
                    f,
                    "Trying to insert an already known pointer {:#x} ({} bytes) at {}. \
                     Previously inserted ({} bytes) at {}",
                    address, bytes, provenance, existing_bytes, existing
                )
            }
            Self::Overlapping {
                address,
                bytes,
                provenance,
                existing_address,
                existing_bytes,
                existing,
            } => {
                write!(
                    f,
                    "Region {:#x} ({} bytes) inserted at {} overlaps region {:#x} ({} bytes) inserted at {}",
                    address, bytes, provenance, existing_address, existing_bytes, existing
                )
            }
            Self::UntrackedErase { address, provenance } => {
                write!(f, "Trying to erase a non-MM pointer {:#x} at {}", address, provenance)
            }
            Self::UnknownAddress { address } => write!(f, "Unknown address {:#x}", address),
            Self::NotTracked { address } => {
                write!(f, "Address {:#x} is not the base of a tracked allocation", address)
            }
            Self::OutOfBounds {
                address,
                offset,
                bytes,
                allocation_bytes,
            } => {
                write!(
                    f,
                    "Transfer of {} bytes at {:#x} (offset {}) exceeds allocation of {} bytes",
                    bytes, address, offset, allocation_bytes
                )
            }
            Self::InvalidConfig(msg) => write!(f, "Invalid ledger configuration: {}", msg),
            Self::InvariantViolation(msg) => write!(f, "Ledger invariant violated: {}", msg),
            Self::Device(err) => {
                write!(f, "Device backend error: ")?;
                fmt::Display::fmt(err, f)
            }
        }
    }
}

impl Error for LedgerError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Device(err) => Some(&**err),
            _ => None,
        }
    }
}

impl From<eyre::Report> for LedgerError {
    fn from(err: eyre::Report) -> Self {
        Self::Device(err)
    }
}
