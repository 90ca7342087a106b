use crate::device::DeviceMemory;
use crate::provenance::Provenance;
use serde::Serialize;

/// Which memory space holds the authoritative copy of an allocation's data.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Residency {
    Host,
    Device,
}

/// A stable handle to an allocation record in the ledger.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct AllocationId(usize);

impl AllocationId {
    pub fn index(&self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone)]
pub(crate) struct Allocation {
    pub host: usize,
    pub bytes: usize,
    pub device: Option<usize>,
    pub residency: Residency,
    pub memory: Option<DeviceMemory>,
    pub provenance: Provenance,
    /// Addresses of the aliases that point into this allocation.
    pub aliases: Vec<usize>,
}

impl Allocation {
    pub fn new(host: usize, bytes: usize, provenance: Provenance) -> Self {
        Self {
            host,
            bytes,
            device: None,
            residency: Residency::Host,
            memory: None,
            provenance,
            aliases: Vec::new(),
        }
    }

    pub fn end(&self) -> usize {
        self.host.saturating_add(self.bytes)
    }

    /// The end of the address range reserved by this allocation.
    ///
    /// Zero-sized allocations still reserve their base address.
    pub fn extent_end(&self) -> usize {
        self.host.saturating_add(self.bytes.max(1))
    }

    pub fn contains(&self, address: usize) -> bool {
        self.host <= address && address < self.end()
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub(crate) struct Alias {
    pub allocation: AllocationId,
    pub offset: usize,
}

/// Slot storage for allocation records. Vacated slots are reused.
#[derive(Debug, Default)]
pub(crate) struct AllocationTable {
    slots: Vec<Option<Allocation>>,
    vacant: Vec<usize>,
}

impl AllocationTable {
    pub fn insert(&mut self, allocation: Allocation) -> AllocationId {
        match self.vacant.pop() {
            Some(index) => {
                debug_assert!(self.slots[index].is_none());
                self.slots[index] = Some(allocation);
                AllocationId(index)
            }
            None => {
                self.slots.push(Some(allocation));
                AllocationId(self.slots.len() - 1)
            }
        }
    }

    pub fn remove(&mut self, id: AllocationId) -> Option<Allocation> {
        let allocation = self.slots.get_mut(id.0)?.take()?;
        self.vacant.push(id.0);
        Some(allocation)
    }

    pub fn get(&self, id: AllocationId) -> Option<&Allocation> {
        self.slots.get(id.0)?.as_ref()
    }

    pub fn get_mut(&mut self, id: AllocationId) -> Option<&mut Allocation> {
        self.slots.get_mut(id.0)?.as_mut()
    }

    pub fn iter(&self) -> impl '_ + Iterator<Item = (AllocationId, &Allocation)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(index, slot)| slot.as_ref().map(|allocation| (AllocationId(index), allocation)))
    }

    pub fn len(&self) -> usize {
        self.slots.len() - self.vacant.len()
    }
}
