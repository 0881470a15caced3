//! Property coverage for the block-granular decoder: uniqueness of the
//! selected resource, overlap rejection, and fast-path equivalence.

#![allow(clippy::pedantic, clippy::nursery)]

use fx2_core::{AddressMap, ConfigError, ResourceId};
use proptest::prelude::*;
use rstest as _;
#[cfg(feature = "serde")]
use serde as _;
use thiserror as _;

/// Reference model: the block ranges of the regions a map accepted.
struct BlockRange {
    start: u32,
    end: u32,
    resource: ResourceId,
}

fn reference_decode(accepted: &[BlockRange], addr: u16) -> Option<ResourceId> {
    let block = u32::from(addr) >> 6;
    accepted
        .iter()
        .find(|range| range.start <= block && block < range.end)
        .map(|range| range.resource)
}

proptest! {
    #[test]
    fn accepted_regions_decode_to_at_most_one_resource(
        regions in prop::collection::vec((any::<u16>(), 1_u16..0x1000), 0..8),
        addrs in prop::collection::vec(any::<u16>(), 64),
    ) {
        let mut map = AddressMap::new();
        let mut accepted = Vec::new();
        for (index, (base, size)) in regions.iter().enumerate() {
            let id = ResourceId::new(index);
            if map.add_region(*base, *size, id).is_ok() {
                accepted.push(BlockRange {
                    start: u32::from(*base) >> 6,
                    end: (u32::from(*base) + u32::from(*size)) >> 6,
                    resource: id,
                });
            }
        }

        // The accepted block ranges must be pairwise disjoint.
        for (i, a) in accepted.iter().enumerate() {
            for b in accepted.iter().skip(i + 1) {
                prop_assert!(
                    a.end <= b.start || b.end <= a.start,
                    "accepted regions share a decode block"
                );
            }
        }

        // Decoding agrees with the reference model everywhere sampled.
        for addr in addrs {
            prop_assert_eq!(map.decode(addr), reference_decode(&accepted, addr));
        }
    }

    #[test]
    fn re_adding_an_accepted_region_is_always_rejected(
        base in any::<u16>(),
        size in 1_u16..0x1000,
    ) {
        let mut map = AddressMap::new();
        let first = ResourceId::new(0);
        prop_assume!(map.add_region(base, size, first).is_ok());
        prop_assert_eq!(
            map.add_region(base, size, ResourceId::new(1)),
            Err(ConfigError::OverlappingRegions { base, size })
        );
    }

    #[test]
    fn zero_base_power_of_two_fast_path_matches_block_decode(
        size_log2 in 6_u32..16,
        extra_base in 0xe000_u16..0xf000,
    ) {
        let size = 1_u16 << size_log2.min(15);
        let mut map = AddressMap::new();
        let ram = ResourceId::new(0);
        map.add_region(0x0000, size, ram).expect("main ram region");
        let other = ResourceId::new(1);
        let _ = map.add_region(extra_base & !0x3f, 0x40, other);

        for addr in 0_u16..=u16::MAX {
            prop_assert_eq!(
                map.decode(addr),
                map.decode_blocks(addr),
                "fast path diverged at {:#06x}",
                addr
            );
        }
    }
}

#[test]
fn main_ram_mask_test_equals_block_decode_for_the_stock_size() {
    let mut map = AddressMap::new();
    let ram = ResourceId::new(0);
    map.add_region(0x0000, 0x4000, ram).expect("main ram region");

    for addr in 0_u16..=u16::MAX {
        let mask_selected = addr & !(0x4000 - 1) == 0;
        assert_eq!(
            map.decode(addr).is_some(),
            mask_selected,
            "mask test diverged at {addr:#06x}"
        );
        assert_eq!(map.decode(addr), map.decode_blocks(addr));
    }
}
