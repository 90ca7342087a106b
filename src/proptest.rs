//! Proptest strategies for ledger scenarios.
use crate::config::ExecutionMode;
use ::proptest::prelude::*;

/// A set of disjoint regions carved out of one contiguous buffer.
///
/// Region `i` starts at `offsets()[i]` and is `sizes[i]` bytes long. Regions are separated by
/// gaps of at least one byte, so that no two regions abut.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegionLayout {
    pub sizes: Vec<usize>,
    pub gaps: Vec<usize>,
}

impl RegionLayout {
    pub fn offsets(&self) -> Vec<usize> {
        let mut offsets = Vec::with_capacity(self.sizes.len());
        let mut position = 0;
        for (size, gap) in self.sizes.iter().zip(&self.gaps) {
            position += gap;
            offsets.push(position);
            position += size;
        }
        offsets
    }

    /// The length of a buffer that can hold all regions.
    pub fn total_len(&self) -> usize {
        self.sizes.iter().sum::<usize>() + self.gaps.iter().sum::<usize>()
    }

    pub fn num_regions(&self) -> usize {
        self.sizes.len()
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct RegionLayoutParams {
    pub max_regions: usize,
    pub max_region_bytes: usize,
    pub max_gap_bytes: usize,
}

impl Default for RegionLayoutParams {
    fn default() -> Self {
        Self {
            max_regions: 8,
            max_region_bytes: 256,
            max_gap_bytes: 16,
        }
    }
}

impl Arbitrary for RegionLayout {
    type Parameters = RegionLayoutParams;
    type Strategy = BoxedStrategy<Self>;

    fn arbitrary_with(params: Self::Parameters) -> Self::Strategy {
        let max_bytes = params.max_region_bytes.max(1);
        let max_gap = params.max_gap_bytes.max(1);
        (1..=params.max_regions.max(1))
            .prop_flat_map(move |n| {
                (
                    prop::collection::vec(1..=max_bytes, n),
                    prop::collection::vec(1..=max_gap, n),
                )
            })
            .prop_map(|(sizes, gaps)| RegionLayout { sizes, gaps })
            .boxed()
    }
}

/// A region layout together with an address (given as region index and byte offset) inside
/// one of its regions.
pub fn layout_and_interior_offset() -> impl Strategy<Value = (RegionLayout, usize, usize)> {
    any::<RegionLayout>().prop_flat_map(|layout| {
        let sizes = layout.sizes.clone();
        (Just(layout), 0..sizes.len()).prop_flat_map(move |(layout, region)| {
            let size = sizes[region];
            (Just(layout), Just(region), 0..size)
        })
    })
}

pub fn execution_mode() -> impl Strategy<Value = ExecutionMode> {
    prop_oneof![Just(ExecutionMode::Host), Just(ExecutionMode::Device)]
}
