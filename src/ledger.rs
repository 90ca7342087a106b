//! The host/device memory ledger.
//!
//! The ledger maps raw host addresses to tracked allocations and to *aliases*, i.e. addresses
//! strictly inside a tracked allocation. Given any such address, the ledger returns the address
//! that is valid for the current [`ExecutionMode`], lazily allocating device memory and moving
//! data between host and device as needed:
//!
//! | residency | mode   | result                                                    |
//! |-----------|--------|-----------------------------------------------------------|
//! | host      | host   | host address, no copy                                     |
//! | device    | device | device address (plus alias offset), no copy               |
//! | device    | host   | full device-to-host copy, host address                    |
//! | host      | device | full host-to-device copy, device address (plus offset)    |
//!
//! Tracked allocations are indexed by their base address in an ordered map, so that the
//! allocation containing an interior address is found by looking up the largest base
//! not greater than the address. Allocations are not allowed to overlap. Once discovered,
//! interior addresses are memoized as aliases.
use crate::config::{ExecutionMode, LedgerConfig};
use crate::device::{DeviceBackend, DeviceMemory, SimulatedDevice};
use crate::error::LedgerError;
use crate::provenance::Provenance;
use log::{debug, error, info, trace};
use rustc_hash::FxHashMap;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::ptr;

mod table;

pub use table::{AllocationId, Residency};
use table::{Alias, Allocation, AllocationTable};

const INTERNAL_ERROR: &str = "Internal error: ledger maps must only refer to live allocations";

/// What the ledger has recorded for an address.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
pub enum Entry {
    /// The base address of a tracked allocation.
    Tracked { id: AllocationId, bytes: usize },
    /// A memoized address inside a tracked allocation.
    Alias {
        id: AllocationId,
        base: usize,
        offset: usize,
    },
}

/// Diagnostic snapshot of a tracked allocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AllocationReport {
    pub id: AllocationId,
    pub host: usize,
    pub bytes: usize,
    pub device: Option<usize>,
    pub residency: Residency,
    pub memory: Option<DeviceMemory>,
    pub provenance: Provenance,
    /// Offsets of all memoized aliases, in ascending order.
    pub alias_offsets: Vec<usize>,
}

impl fmt::Display for AllocationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "mem : {} @{:#x} ({} bytes, ", self.provenance, self.host, self.bytes)?;
        match self.residency {
            Residency::Host => write!(f, "resident on host, ")?,
            Residency::Device => write!(f, "resident on device, ")?,
        }
        match self.device {
            Some(device) => write!(f, "device @{:#x}, ", device)?,
            None => write!(f, "no device buffer, ")?,
        }
        write!(f, "{} aliases)", self.alias_offsets.len())
    }
}

#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LedgerStats {
    /// Number of tracked allocations.
    pub tracked: usize,
    /// Number of memoized aliases.
    pub aliases: usize,
    pub tracked_bytes: usize,
    /// Bytes of tracked allocations that have a device buffer.
    pub device_bytes: usize,
    /// Number of allocations whose authoritative data lives on the device.
    pub device_resident: usize,
}

/// An address classified as belonging to a tracked allocation.
#[derive(Debug, Copy, Clone)]
struct Target {
    id: AllocationId,
    offset: usize,
}

/// Registry of tracked host allocations and their device counterparts.
///
/// Every operation takes the [`LedgerConfig`] it should act under. The ledger itself holds no
/// configuration, so its behavior is fully determined by its recorded state, the operation and
/// the configuration passed in.
///
/// The ledger owns the device buffers it allocates and releases them when the corresponding
/// allocation is erased. It never owns host memory.
#[derive(Debug)]
pub struct Ledger<B = SimulatedDevice> {
    backend: B,
    table: AllocationTable,
    bases: BTreeMap<usize, AllocationId>,
    aliases: FxHashMap<usize, Alias>,
    last_config: Option<LedgerConfig>,
}

impl Default for Ledger<SimulatedDevice> {
    fn default() -> Self {
        Self::new(SimulatedDevice::default())
    }
}

impl<B> Ledger<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            table: AllocationTable::default(),
            bases: BTreeMap::new(),
            aliases: FxHashMap::default(),
            last_config: None,
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    pub fn into_backend(self) -> B {
        self.backend
    }

    /// Returns `true` if `ptr` is exactly the base address of a tracked allocation.
    pub fn is_tracked<T>(&self, ptr: *const T) -> bool {
        self.bases.contains_key(&(ptr as usize))
    }

    /// Returns the recorded entry for `ptr`.
    ///
    /// Interior addresses that have not yet been resolved are not memoized and therefore
    /// return `None`.
    pub fn lookup<T>(&self, ptr: *const T) -> Option<Entry> {
        let address = ptr as usize;
        if let Some(&id) = self.bases.get(&address) {
            let bytes = self.allocation(id).bytes;
            return Some(Entry::Tracked { id, bytes });
        }
        self.aliases.get(&address).map(|alias| Entry::Alias {
            id: alias.allocation,
            base: self.allocation(alias.allocation).host,
            offset: alias.offset,
        })
    }

    /// Returns the residency of the allocation containing `ptr`, if any.
    pub fn residency<T>(&self, ptr: *const T) -> Option<Residency> {
        let target = self.find(ptr as usize)?;
        Some(self.allocation(target.id).residency)
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> LedgerStats {
        let mut stats = LedgerStats {
            tracked: self.table.len(),
            aliases: self.aliases.len(),
            ..LedgerStats::default()
        };
        for (_, allocation) in self.table.iter() {
            stats.tracked_bytes += allocation.bytes;
            if allocation.device.is_some() {
                stats.device_bytes += allocation.bytes;
            }
            if allocation.residency == Residency::Device {
                stats.device_resident += 1;
            }
        }
        stats
    }

    /// Describes the tracked allocation based at `ptr`.
    pub fn dump<T>(&self, ptr: *const T) -> Result<AllocationReport, LedgerError> {
        let address = ptr as usize;
        let id = match self.bases.get(&address) {
            Some(&id) => id,
            None => return Err(report_error(LedgerError::NotTracked { address })),
        };
        let report = self.report(id);
        info!("{}", report);
        Ok(report)
    }

    /// Describes all tracked allocations, ordered by base address.
    pub fn reports(&self) -> Vec<AllocationReport> {
        self.bases.values().map(|&id| self.report(id)).collect()
    }

    /// Checks the internal consistency of the ledger.
    ///
    /// This is done automatically after every mutating operation when the configuration has
    /// `debug` set.
    pub fn validate(&self) -> Result<(), LedgerError> {
        let violation = |msg: String| Err(LedgerError::InvariantViolation(msg));

        if self.bases.len() != self.table.len() {
            return violation(format!(
                "{} base addresses, but {} allocation records",
                self.bases.len(),
                self.table.len()
            ));
        }

        let mut previous: Option<(usize, usize)> = None;
        let mut listed_aliases = 0;
        for (&base, &id) in &self.bases {
            let allocation = match self.table.get(id) {
                Some(allocation) => allocation,
                None => return violation(format!("base {:#x} refers to a vacant record", base)),
            };
            if allocation.host != base {
                return violation(format!("base {:#x} refers to allocation at {:#x}", base, allocation.host));
            }
            if let Some((previous_base, previous_end)) = previous {
                if base < previous_end {
                    return violation(format!("allocations at {:#x} and {:#x} overlap", previous_base, base));
                }
            }
            previous = Some((base, allocation.extent_end()));

            if allocation.residency == Residency::Device && allocation.device.is_none() {
                return violation(format!("allocation {:#x} is device-resident without a device buffer", base));
            }
            if self.aliases.contains_key(&base) {
                return violation(format!("{:#x} is both a base and an alias", base));
            }

            for &alias_address in &allocation.aliases {
                let consistent = match self.aliases.get(&alias_address) {
                    Some(alias) => {
                        alias.allocation == id
                            && alias_address.checked_sub(base) == Some(alias.offset)
                            && alias.offset > 0
                            && alias.offset < allocation.bytes
                    }
                    None => false,
                };
                if !consistent {
                    return violation(format!("alias {:#x} of {:#x} is inconsistent", alias_address, base));
                }
            }
            listed_aliases += allocation.aliases.len();
        }

        if listed_aliases != self.aliases.len() {
            return violation(format!(
                "{} aliases recorded, but only {} belong to a live allocation",
                self.aliases.len(),
                listed_aliases
            ));
        }
        Ok(())
    }

    fn allocation(&self, id: AllocationId) -> &Allocation {
        self.table.get(id).expect(INTERNAL_ERROR)
    }

    fn report(&self, id: AllocationId) -> AllocationReport {
        let allocation = self.allocation(id);
        let mut alias_offsets: Vec<_> = allocation
            .aliases
            .iter()
            .map(|address| address - allocation.host)
            .collect();
        alias_offsets.sort_unstable();
        AllocationReport {
            id,
            host: allocation.host,
            bytes: allocation.bytes,
            device: allocation.device,
            residency: allocation.residency,
            memory: allocation.memory,
            provenance: allocation.provenance,
            alias_offsets,
        }
    }

    /// Classifies an address without memoizing it.
    fn find(&self, address: usize) -> Option<Target> {
        if let Some(&id) = self.bases.get(&address) {
            return Some(Target { id, offset: 0 });
        }
        if let Some(alias) = self.aliases.get(&address) {
            return Some(Target {
                id: alias.allocation,
                offset: alias.offset,
            });
        }
        self.find_containing(address)
    }

    /// Finds the allocation whose byte range strictly contains `address` beyond its base.
    fn find_containing(&self, address: usize) -> Option<Target> {
        let (&base, &id) = self.bases.range(..address).next_back()?;
        self.allocation(id).contains(address).then(|| Target {
            id,
            offset: address - base,
        })
    }

    /// Finds an allocation whose reserved range intersects `[address, address + bytes)`.
    fn find_overlap(&self, address: usize, bytes: usize) -> Option<AllocationId> {
        if let Some((_, &id)) = self.bases.range(..=address).next_back() {
            if self.allocation(id).extent_end() > address {
                return Some(id);
            }
        }
        let end = address.saturating_add(bytes.max(1));
        self.bases.range(address..end).next().map(|(_, &id)| id)
    }

    /// Classifies an address, memoizing newly discovered aliases.
    fn classify(&mut self, address: usize) -> Result<Target, LedgerError> {
        if let Some(target) = self.find(address) {
            if target.offset > 0 && !self.aliases.contains_key(&address) {
                let allocation = self.table.get_mut(target.id).expect(INTERNAL_ERROR);
                allocation.aliases.push(address);
                self.aliases.insert(
                    address,
                    Alias {
                        allocation: target.id,
                        offset: target.offset,
                    },
                );
                debug!(
                    "Memoized alias {:#x} at offset {} of {:#x}",
                    address, target.offset, allocation.host
                );
            }
            Ok(target)
        } else {
            Err(report_error(LedgerError::UnknownAddress { address }))
        }
    }

    fn check_invariants(&self, config: &LedgerConfig) -> Result<(), LedgerError> {
        if config.debug {
            self.validate().map_err(report_error)
        } else {
            Ok(())
        }
    }

    fn log_config(&mut self, config: &LedgerConfig) {
        if config.debug && self.last_config.as_ref() != Some(config) {
            debug!("{}", config);
            self.last_config = Some(*config);
        }
    }
}

impl<B: DeviceBackend> Ledger<B> {
    /// Registers the region `[ptr, ptr + bytes)` as a tracked allocation, resident on the host.
    ///
    /// Returns `ptr` unchanged. When the configuration bypasses registration, nothing is
    /// recorded.
    ///
    /// # Errors
    ///
    /// Registering an address that is already tracked, or a region overlapping a tracked
    /// allocation, is a programming error. The returned error carries the provenance of both
    /// registrations.
    ///
    /// # Safety
    ///
    /// Until the allocation is erased, the region must remain valid for reads and writes of
    /// `bytes` bytes, since the ledger copies data in and out of it when resolving pointers.
    pub unsafe fn insert<T>(
        &mut self,
        ptr: *mut T,
        bytes: usize,
        provenance: Provenance,
        config: &LedgerConfig,
    ) -> Result<*mut T, LedgerError> {
        self.log_config(config);
        if config.bypasses_registration() {
            trace!("Registration bypassed for {:p}", ptr);
            return Ok(ptr);
        }

        let address = ptr as usize;
        if ptr.is_null() {
            return Err(report_error(LedgerError::NullAddress { provenance }));
        }
        if let Some(&id) = self.bases.get(&address) {
            let existing = self.allocation(id);
            return Err(report_error(LedgerError::AlreadyTracked {
                address,
                bytes,
                provenance,
                existing_bytes: existing.bytes,
                existing: existing.provenance,
            }));
        }
        if let Some(id) = self.find_overlap(address, bytes) {
            let existing = self.allocation(id);
            return Err(report_error(LedgerError::Overlapping {
                address,
                bytes,
                provenance,
                existing_address: existing.host,
                existing_bytes: existing.bytes,
                existing: existing.provenance,
            }));
        }

        let id = self.table.insert(Allocation::new(address, bytes, provenance));
        self.bases.insert(address, id);
        debug!("Inserted {:#x} ({} bytes) at {}", address, bytes, provenance);
        self.check_invariants(config)?;
        Ok(ptr)
    }

    /// Removes the allocation based at `ptr` together with all of its aliases, and releases
    /// its device buffer.
    ///
    /// Erasing an unknown address is tolerated when executing on the host, since not every
    /// host buffer is under management. When executing on the device it is an error.
    pub fn erase<T>(
        &mut self,
        ptr: *mut T,
        provenance: Provenance,
        config: &LedgerConfig,
    ) -> Result<*mut T, LedgerError> {
        self.log_config(config);
        if config.bypasses_registration() {
            trace!("Deregistration bypassed for {:p}", ptr);
            return Ok(ptr);
        }

        let address = ptr as usize;
        let id = match self.bases.remove(&address) {
            Some(id) => id,
            None if config.executes_on_device() => {
                return Err(report_error(LedgerError::UntrackedErase { address, provenance }));
            }
            None => {
                trace!("Ignoring erase of unmanaged pointer {:#x} at {}", address, provenance);
                return Ok(ptr);
            }
        };

        let allocation = self.table.remove(id).expect(INTERNAL_ERROR);
        for alias in &allocation.aliases {
            self.aliases.remove(alias);
        }
        debug!(
            "Erased {:#x} ({} bytes, {} aliases) at {}",
            address,
            allocation.bytes,
            allocation.aliases.len(),
            provenance
        );

        if let Some(device) = allocation.device {
            // SAFETY: the buffer was allocated by this backend for this allocation, and the
            // record referring to it is gone
            unsafe { self.backend.free(device as *mut u8)? };
        }
        self.check_invariants(config)?;
        Ok(ptr)
    }

    /// Returns the address to use for `ptr` under the configured execution mode, migrating the
    /// containing allocation between host and device if needed.
    ///
    /// `ptr` may be a tracked base, a memoized alias or any address inside a tracked
    /// allocation. Migration always transfers the whole allocation.
    pub fn resolve<T>(&mut self, ptr: *mut T, config: &LedgerConfig) -> Result<*mut T, LedgerError> {
        self.log_config(config);
        if config.bypasses_resolution() {
            return Ok(ptr);
        }
        let address = ptr as usize;
        let target = self.classify(address)?;
        let resolved = self.resolve_target(address, target, config.mode)?;
        self.check_invariants(config)?;
        Ok(resolved as *mut T)
    }

    pub fn resolve_const<T>(
        &mut self,
        ptr: *const T,
        config: &LedgerConfig,
    ) -> Result<*const T, LedgerError> {
        self.resolve(ptr as *mut T, config).map(|ptr| ptr as *const T)
    }

    /// Copies `bytes` bytes starting at `ptr` from the host to the device, regardless of
    /// residency. `bytes == 0` transfers everything from `ptr` to the end of its allocation.
    ///
    /// A transfer covering the whole allocation makes it device-resident. Partial transfers
    /// leave the residency unchanged.
    pub fn push<T>(&mut self, ptr: *const T, bytes: usize, config: &LedgerConfig) -> Result<(), LedgerError> {
        self.log_config(config);
        if config.bypasses_resolution() {
            return Ok(());
        }
        let address = ptr as usize;
        let target = self.classify(address)?;

        let Self { backend, table, .. } = self;
        let allocation = table.get_mut(target.id).expect(INTERNAL_ERROR);
        let bytes = transfer_size(address, target.offset, bytes, allocation)?;
        let device = ensure_device(backend, allocation)?;
        debug!("Pushing {} bytes from {:#x}", bytes, address);
        // SAFETY: the range lies within a registered region, see `insert`
        unsafe { backend.copy_host_to_device((device + target.offset) as *mut u8, address as *const u8, bytes)? };
        if target.offset == 0 && bytes == allocation.bytes {
            allocation.residency = Residency::Device;
        }
        self.check_invariants(config)
    }

    /// Copies `bytes` bytes starting at `ptr` from the device back to the host, regardless of
    /// residency. `bytes == 0` transfers everything from `ptr` to the end of its allocation.
    ///
    /// Nothing is copied if the allocation has no device buffer yet. A transfer covering the
    /// whole allocation makes it host-resident.
    pub fn pull<T>(&mut self, ptr: *const T, bytes: usize, config: &LedgerConfig) -> Result<(), LedgerError> {
        self.log_config(config);
        if config.bypasses_resolution() {
            return Ok(());
        }
        let address = ptr as usize;
        let target = self.classify(address)?;

        let Self { backend, table, .. } = self;
        let allocation = table.get_mut(target.id).expect(INTERNAL_ERROR);
        let bytes = transfer_size(address, target.offset, bytes, allocation)?;
        let device = match allocation.device {
            Some(device) => device,
            None => {
                debug!("Nothing to pull for {:#x}: no device buffer", address);
                return Ok(());
            }
        };
        debug!("Pulling {} bytes into {:#x}", bytes, address);
        // SAFETY: the range lies within a registered region, see `insert`
        unsafe { backend.copy_device_to_host(address as *mut u8, (device + target.offset) as *const u8, bytes)? };
        if target.offset == 0 && bytes == allocation.bytes {
            allocation.residency = Residency::Host;
        }
        self.check_invariants(config)
    }

    /// Returns a device memory handle for the tracked allocation based at `ptr`.
    ///
    /// On first request the device buffer is allocated and filled with the host data, and the
    /// allocation becomes device-resident. Later requests return the same handle without
    /// transferring data. Without memory management, the host memory itself is wrapped.
    pub fn device_memory<T>(&mut self, ptr: *const T, config: &LedgerConfig) -> Result<DeviceMemory, LedgerError> {
        self.log_config(config);
        if config.bypasses_registration() {
            return Ok(DeviceMemory::wrap_host(ptr));
        }
        let address = ptr as usize;
        let id = match self.bases.get(&address) {
            Some(&id) => id,
            None => return Err(report_error(LedgerError::NotTracked { address })),
        };

        let Self { backend, table, .. } = self;
        let allocation = table.get_mut(id).expect(INTERNAL_ERROR);
        if allocation.device.is_none() {
            let device = ensure_device(backend, allocation)?;
            // SAFETY: the allocation is a registered region, see `insert`
            unsafe { backend.copy_host_to_device(device as *mut u8, allocation.host as *const u8, allocation.bytes)? };
            allocation.residency = Residency::Device;
        }
        let device = allocation.device.expect("Internal error: device buffer was just ensured");
        let memory = *allocation.memory.get_or_insert(DeviceMemory {
            address: device,
            bytes: allocation.bytes,
        });
        self.check_invariants(config)?;
        Ok(memory)
    }

    /// Copies `bytes` bytes from `src` to `dst`.
    ///
    /// When executing on the host, tracked allocations containing either address are first
    /// pulled to the host, and the bytes are then copied in host memory. Untracked addresses
    /// are copied as they are. When executing on the device, both addresses are resolved through
    /// the ledger (migrating their allocations to the device if needed) and copied
    /// device-to-device, optionally asynchronously. A copy of zero bytes does nothing.
    /// Returns `dst`.
    ///
    /// # Safety
    ///
    /// On the host, untracked ranges must be valid for `bytes` bytes. Tracked ranges, and both
    /// ranges on the device, must lie within their allocations, which is checked.
    pub unsafe fn copy<T>(
        &mut self,
        dst: *mut T,
        src: *const T,
        bytes: usize,
        asynchronous: bool,
        config: &LedgerConfig,
    ) -> Result<*mut T, LedgerError> {
        self.log_config(config);
        if bytes == 0 {
            return Ok(dst);
        }
        if config.bypasses_resolution() {
            ptr::copy(src as *const u8, dst as *mut u8, bytes);
            return Ok(dst);
        }

        let src_address = src as usize;
        let dst_address = dst as usize;
        if !config.executes_on_device() {
            let mut tracked = Vec::with_capacity(2);
            for address in [src_address, dst_address] {
                if self.find(address).is_some() {
                    let target = self.classify(address)?;
                    transfer_size(address, target.offset, bytes, self.allocation(target.id))?;
                    tracked.push((address, target));
                }
            }
            // The host copies of tracked data must be current before they are read or overwritten
            for (address, target) in tracked {
                self.resolve_target(address, target, ExecutionMode::Host)?;
            }
            ptr::copy(src as *const u8, dst as *mut u8, bytes);
            self.check_invariants(config)?;
            return Ok(dst);
        }

        let src_target = self.classify(src_address)?;
        let dst_target = self.classify(dst_address)?;
        for (address, target) in [(src_address, src_target), (dst_address, dst_target)] {
            transfer_size(address, target.offset, bytes, self.allocation(target.id))?;
        }

        let src_device = self.resolve_target(src_address, src_target, ExecutionMode::Device)?;
        let dst_device = self.resolve_target(dst_address, dst_target, ExecutionMode::Device)?;
        self.backend
            .copy_device_to_device(dst_device as *mut u8, src_device as *const u8, bytes, asynchronous)?;
        self.check_invariants(config)?;
        Ok(dst)
    }

    /// Waits for all asynchronous device work to complete.
    pub fn synchronize(&mut self) -> Result<(), LedgerError> {
        self.backend.synchronize().map_err(LedgerError::from)
    }

    fn resolve_target(&mut self, address: usize, target: Target, mode: ExecutionMode) -> Result<usize, LedgerError> {
        let Self { backend, table, .. } = self;
        let allocation = table.get_mut(target.id).expect(INTERNAL_ERROR);
        match (allocation.residency, mode) {
            (Residency::Host, ExecutionMode::Host) => Ok(address),
            (Residency::Device, ExecutionMode::Device) => {
                let device = allocation.device.expect(DEVICE_RESIDENT_ERROR);
                Ok(device + target.offset)
            }
            (Residency::Device, ExecutionMode::Host) => {
                let device = allocation.device.expect(DEVICE_RESIDENT_ERROR);
                debug!("Pulling {} bytes of {:#x}", allocation.bytes, allocation.host);
                // SAFETY: the allocation is a registered region, see `insert`
                unsafe {
                    backend.copy_device_to_host(allocation.host as *mut u8, device as *const u8, allocation.bytes)?
                };
                allocation.residency = Residency::Host;
                Ok(address)
            }
            (Residency::Host, ExecutionMode::Device) => {
                let device = ensure_device(backend, allocation)?;
                debug!("Pushing {} bytes of {:#x}", allocation.bytes, allocation.host);
                // SAFETY: the allocation is a registered region, see `insert`
                unsafe {
                    backend.copy_host_to_device(device as *mut u8, allocation.host as *const u8, allocation.bytes)?
                };
                allocation.residency = Residency::Device;
                Ok(device + target.offset)
            }
        }
    }
}

const DEVICE_RESIDENT_ERROR: &str = "Internal error: device-resident allocation must have a device buffer";

fn ensure_device<B: DeviceBackend>(backend: &mut B, allocation: &mut Allocation) -> Result<usize, LedgerError> {
    match allocation.device {
        Some(device) => Ok(device),
        None => {
            let device = backend.allocate(allocation.bytes)? as usize;
            debug!(
                "Allocated {} device bytes at {:#x} for {:#x} ({})",
                allocation.bytes,
                device,
                allocation.host,
                backend.name()
            );
            allocation.device = Some(device);
            Ok(device)
        }
    }
}

/// Resolves the `bytes == 0` sentinel and checks that the transfer stays within the allocation.
fn transfer_size(address: usize, offset: usize, bytes: usize, allocation: &Allocation) -> Result<usize, LedgerError> {
    let available = allocation.bytes - offset;
    let bytes = if bytes == 0 { available } else { bytes };
    if bytes > available {
        return Err(report_error(LedgerError::OutOfBounds {
            address,
            offset,
            bytes,
            allocation_bytes: allocation.bytes,
        }));
    }
    Ok(bytes)
}

fn report_error(err: LedgerError) -> LedgerError {
    error!("{}", err);
    err
}
