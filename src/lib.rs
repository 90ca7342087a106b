//! Host/device memory management for `fenris`.
//!
//! The central type is the [`Ledger`], which keeps track of host allocations that may be
//! mirrored on an accelerator device. Computational code asks the ledger for the pointer that is
//! valid for where it is about to run, and the ledger takes care of allocating device memory and
//! moving data back and forth.
//!
//! ```rust
//! use fenris_mm::{provenance, Ledger, LedgerConfig};
//!
//! # fn main() -> Result<(), fenris_mm::LedgerError> {
//! let mut ledger: Ledger = Ledger::default();
//! let mut data = vec![1.0f64, 2.0, 3.0, 4.0];
//! let bytes = data.len() * std::mem::size_of::<f64>();
//! let host = data.as_mut_ptr();
//!
//! // The vector outlives its registration
//! unsafe { ledger.insert(host, bytes, provenance!(), &LedgerConfig::host_only())? };
//!
//! // Executing on the device migrates the whole vector, also when resolving an interior pointer
//! let device = LedgerConfig::device();
//! let second = ledger.resolve(host.wrapping_add(1), &device)?;
//! assert_ne!(second, host.wrapping_add(1));
//!
//! // Back on the host, the data is pulled back before the host pointer is handed out
//! let second = ledger.resolve(host.wrapping_add(1), &LedgerConfig::host_only())?;
//! assert_eq!(second, host.wrapping_add(1));
//!
//! ledger.erase(host, provenance!(), &LedgerConfig::host_only())?;
//! assert!(!ledger.is_tracked(host));
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod device;
pub mod error;
pub mod ledger;
pub mod provenance;
pub mod sync;

#[cfg(feature = "proptest")]
pub mod proptest;

pub use config::{DeviceSupport, ExecutionMode, LedgerConfig};
pub use error::LedgerError;
pub use ledger::{AllocationId, AllocationReport, Entry, Ledger, LedgerStats, Residency};
pub use provenance::Provenance;
pub use sync::SyncLedger;
