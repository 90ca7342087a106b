use crate::device::{DeviceBackend, TransferStats};
use eyre::{bail, eyre};
use log::debug;
use std::collections::BTreeMap;
use std::ptr;

/// A device backend whose "device memory" lives in host allocations.
///
/// Device ranges passed to the backend are validated against the live buffers, so that
/// out-of-range transfers and use-after-free are reported as errors instead of corrupting
/// memory. Asynchronous copies are queued and executed when the backend is synchronized, or
/// before any other transfer is issued.
#[derive(Debug, Default)]
pub struct SimulatedDevice {
    buffers: BTreeMap<usize, DeviceBuffer>,
    pending: Vec<PendingCopy>,
    memory_limit: Option<usize>,
    stats: TransferStats,
}

// The buffers are exclusively owned by the device and only accessed through `&mut self`.
unsafe impl Send for SimulatedDevice {}

#[derive(Debug)]
struct DeviceBuffer {
    ptr: *mut u8,
    len: usize,
    capacity: usize,
}

impl DeviceBuffer {
    fn new(len: usize) -> Self {
        // Zero-sized buffers still need a unique address
        let capacity = len.max(1);
        let ptr = Box::into_raw(vec![0u8; capacity].into_boxed_slice()) as *mut u8;
        Self { ptr, len, capacity }
    }
}

impl Drop for DeviceBuffer {
    fn drop(&mut self) {
        // SAFETY: `ptr` was obtained from a boxed slice of exactly `capacity` bytes
        unsafe {
            drop(Box::from_raw(ptr::slice_from_raw_parts_mut(self.ptr, self.capacity)));
        }
    }
}

#[derive(Debug, Copy, Clone)]
struct PendingCopy {
    dst: *mut u8,
    src: *const u8,
    bytes: usize,
}

impl SimulatedDevice {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes allocations fail once more than `bytes` bytes would be allocated at the same time.
    pub fn with_memory_limit(self, bytes: usize) -> Self {
        Self {
            memory_limit: Some(bytes),
            ..self
        }
    }

    pub fn stats(&self) -> TransferStats {
        self.stats
    }

    pub fn reset_stats(&mut self) {
        self.stats = TransferStats {
            allocated_bytes: self.stats.allocated_bytes,
            ..TransferStats::default()
        };
    }

    pub fn num_buffers(&self) -> usize {
        self.buffers.len()
    }

    pub fn num_pending_copies(&self) -> usize {
        self.pending.len()
    }

    /// Returns a copy of the device range `[device, device + bytes)`.
    ///
    /// Pending asynchronous copies are *not* applied first, so this observes the device
    /// memory exactly as it currently is.
    pub fn read(&self, device: *const u8, bytes: usize) -> eyre::Result<Vec<u8>> {
        let src = self.checked_range(device as usize, bytes)?;
        let mut data = vec![0u8; bytes];
        // SAFETY: the range was validated against a live buffer
        unsafe { ptr::copy_nonoverlapping(src, data.as_mut_ptr(), bytes) };
        Ok(data)
    }

    /// Overwrites the device range starting at `device` with `data`.
    ///
    /// Used to emulate kernels that mutate device memory.
    pub fn write(&mut self, device: *mut u8, data: &[u8]) -> eyre::Result<()> {
        self.flush()?;
        let dst = self.checked_range(device as usize, data.len())?;
        // SAFETY: the range was validated against a live buffer
        unsafe { ptr::copy_nonoverlapping(data.as_ptr(), dst, data.len()) };
        Ok(())
    }

    /// Translates a device range into a pointer derived from the owning buffer.
    fn checked_range(&self, address: usize, bytes: usize) -> eyre::Result<*mut u8> {
        let (&start, buffer) = self
            .buffers
            .range(..=address)
            .next_back()
            .ok_or_else(|| eyre!("Address {:#x} does not belong to any device buffer", address))?;
        let offset = address - start;
        if offset > buffer.len || bytes > buffer.len - offset {
            bail!(
                "Device range {:#x}..{:#x} exceeds buffer {:#x} of {} bytes",
                address,
                address.saturating_add(bytes),
                start,
                buffer.len
            );
        }
        // SAFETY: offset <= len <= capacity
        Ok(unsafe { buffer.ptr.add(offset) })
    }

    fn flush(&mut self) -> eyre::Result<()> {
        for copy in self.pending.drain(..) {
            // SAFETY: both ranges were validated when the copy was enqueued, and buffers
            // cannot be freed without flushing first
            unsafe { ptr::copy(copy.src, copy.dst, copy.bytes) };
        }
        Ok(())
    }
}

impl DeviceBackend for SimulatedDevice {
    fn name(&self) -> &str {
        "simulated"
    }

    fn allocate(&mut self, bytes: usize) -> eyre::Result<*mut u8> {
        self.flush()?;
        if let Some(limit) = self.memory_limit {
            let requested = self.stats.allocated_bytes + bytes;
            if requested > limit {
                bail!(
                    "Out of device memory: {} bytes requested, {} of {} bytes in use",
                    bytes,
                    self.stats.allocated_bytes,
                    limit
                );
            }
        }
        let buffer = DeviceBuffer::new(bytes);
        let ptr = buffer.ptr;
        self.buffers.insert(ptr as usize, buffer);
        self.stats.allocations += 1;
        self.stats.allocated_bytes += bytes;
        debug!("Allocated {} bytes of simulated device memory at {:p}", bytes, ptr);
        Ok(ptr)
    }

    unsafe fn free(&mut self, device: *mut u8) -> eyre::Result<()> {
        self.flush()?;
        let buffer = self
            .buffers
            .remove(&(device as usize))
            .ok_or_else(|| eyre!("Trying to free unknown device pointer {:p}", device))?;
        self.stats.frees += 1;
        self.stats.allocated_bytes -= buffer.len;
        debug!("Freed {} bytes of simulated device memory at {:p}", buffer.len, device);
        Ok(())
    }

    unsafe fn copy_host_to_device(&mut self, device: *mut u8, host: *const u8, bytes: usize) -> eyre::Result<()> {
        self.flush()?;
        let dst = self.checked_range(device as usize, bytes)?;
        ptr::copy(host, dst, bytes);
        self.stats.host_to_device_copies += 1;
        self.stats.host_to_device_bytes += bytes;
        Ok(())
    }

    unsafe fn copy_device_to_host(&mut self, host: *mut u8, device: *const u8, bytes: usize) -> eyre::Result<()> {
        self.flush()?;
        let src = self.checked_range(device as usize, bytes)?;
        ptr::copy(src, host, bytes);
        self.stats.device_to_host_copies += 1;
        self.stats.device_to_host_bytes += bytes;
        Ok(())
    }

    unsafe fn copy_device_to_device(
        &mut self,
        dst: *mut u8,
        src: *const u8,
        bytes: usize,
        asynchronous: bool,
    ) -> eyre::Result<()> {
        let src = self.checked_range(src as usize, bytes)?;
        let dst = self.checked_range(dst as usize, bytes)?;
        self.stats.device_to_device_copies += 1;
        self.stats.device_to_device_bytes += bytes;
        if asynchronous {
            self.stats.asynchronous_copies += 1;
            self.pending.push(PendingCopy { dst, src, bytes });
        } else {
            self.flush()?;
            ptr::copy(src, dst, bytes);
        }
        Ok(())
    }

    fn synchronize(&mut self) -> eyre::Result<()> {
        self.flush()
    }
}
