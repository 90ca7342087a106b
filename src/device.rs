//! Device backends used by the ledger to allocate device memory and move data.
//!
//! The ledger is agnostic to the accelerator runtime in use. Anything that can allocate device
//! buffers and copy between host and device can be plugged in by implementing
//! [`DeviceBackend`]. The crate ships with [`SimulatedDevice`], which emulates device memory with
//! host allocations and is used for testing and pure-CPU runs.
use serde::Serialize;

mod simulated;

pub use simulated::SimulatedDevice;

/// Allocation and transfer primitives of an accelerator runtime.
///
/// Device pointers are opaque to the ledger: it only ever offsets them and hands them back to
/// the backend or to the caller.
pub trait DeviceBackend {
    fn name(&self) -> &str;

    /// Allocates a device buffer of the given size.
    fn allocate(&mut self, bytes: usize) -> eyre::Result<*mut u8>;

    /// Releases a buffer previously returned by [`allocate`](Self::allocate).
    ///
    /// # Safety
    ///
    /// The buffer must not be accessed after it has been freed.
    unsafe fn free(&mut self, device: *mut u8) -> eyre::Result<()>;

    /// # Safety
    ///
    /// `host` must be valid for reads of `bytes` bytes.
    unsafe fn copy_host_to_device(&mut self, device: *mut u8, host: *const u8, bytes: usize) -> eyre::Result<()>;

    /// # Safety
    ///
    /// `host` must be valid for writes of `bytes` bytes.
    unsafe fn copy_device_to_host(&mut self, host: *mut u8, device: *const u8, bytes: usize) -> eyre::Result<()>;

    /// Copies between two device ranges. An asynchronous copy is only guaranteed to have
    /// completed after the next call to [`synchronize`](Self::synchronize), but is ordered
    /// before any subsequent transfer issued to the same backend.
    ///
    /// # Safety
    ///
    /// Both ranges must stay allocated until the copy has completed.
    unsafe fn copy_device_to_device(
        &mut self,
        dst: *mut u8,
        src: *const u8,
        bytes: usize,
        asynchronous: bool,
    ) -> eyre::Result<()>;

    /// Blocks until all pending asynchronous work has completed.
    fn synchronize(&mut self) -> eyre::Result<()>;
}

impl<B: DeviceBackend + ?Sized> DeviceBackend for Box<B> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn allocate(&mut self, bytes: usize) -> eyre::Result<*mut u8> {
        (**self).allocate(bytes)
    }

    unsafe fn free(&mut self, device: *mut u8) -> eyre::Result<()> {
        (**self).free(device)
    }

    unsafe fn copy_host_to_device(&mut self, device: *mut u8, host: *const u8, bytes: usize) -> eyre::Result<()> {
        (**self).copy_host_to_device(device, host, bytes)
    }

    unsafe fn copy_device_to_host(&mut self, host: *mut u8, device: *const u8, bytes: usize) -> eyre::Result<()> {
        (**self).copy_device_to_host(host, device, bytes)
    }

    unsafe fn copy_device_to_device(
        &mut self,
        dst: *mut u8,
        src: *const u8,
        bytes: usize,
        asynchronous: bool,
    ) -> eyre::Result<()> {
        (**self).copy_device_to_device(dst, src, bytes, asynchronous)
    }

    fn synchronize(&mut self) -> eyre::Result<()> {
        (**self).synchronize()
    }
}

/// A handle to a device memory region.
///
/// A handle with `bytes == 0` wraps host memory that is not under management.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct DeviceMemory {
    pub address: usize,
    pub bytes: usize,
}

impl DeviceMemory {
    pub fn wrap_host<T>(ptr: *const T) -> Self {
        Self {
            address: ptr as usize,
            bytes: 0,
        }
    }

    pub fn as_ptr<T>(&self) -> *mut T {
        self.address as *mut T
    }

    pub fn is_host_wrapper(&self) -> bool {
        self.bytes == 0
    }
}

/// Counters of the work performed by a backend.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TransferStats {
    pub allocations: usize,
    pub frees: usize,
    /// Bytes currently allocated on the device.
    pub allocated_bytes: usize,
    pub host_to_device_copies: usize,
    pub host_to_device_bytes: usize,
    pub device_to_host_copies: usize,
    pub device_to_host_bytes: usize,
    pub device_to_device_copies: usize,
    pub device_to_device_bytes: usize,
    /// Number of device-to-device copies that were issued asynchronously.
    pub asynchronous_copies: usize,
}

impl TransferStats {
    /// Total number of copies in either direction.
    pub fn copies(&self) -> usize {
        self.host_to_device_copies + self.device_to_host_copies + self.device_to_device_copies
    }
}
