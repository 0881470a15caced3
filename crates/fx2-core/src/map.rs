//! Block-granular address map and decoder.
//!
//! Decoding works on fixed power-of-two blocks: a region occupies the
//! half-open block range `[base >> n, (base + size) >> n)` and an address
//! selects a region when its own block falls inside that range. Regions whose
//! block ranges intersect cannot be told apart by this scheme, so they are
//! rejected when the map is built.

use crate::error::ConfigError;

/// Default decode block size in addressable units.
pub const DEFAULT_BLOCK_SIZE: u16 = 64;

/// Index of a mapped resource in the owning system's resource table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct ResourceId(usize);

impl ResourceId {
    /// Wraps a resource-table index.
    #[must_use]
    pub const fn new(index: usize) -> Self {
        Self(index)
    }

    /// Returns the resource-table index.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0
    }
}

/// A successfully decoded access: which resource, and where inside it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct DecodedAccess {
    /// The selected resource.
    pub resource: ResourceId,
    /// Address translated into the resource's zero-based frame.
    pub local: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
struct MappedRegion {
    base: u16,
    size: u16,
    block_start: u32,
    block_end: u32,
    resource: ResourceId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
struct FastPath {
    mask: u16,
    resource: ResourceId,
}

/// Partition of the 16-bit address space into block-granular regions.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct AddressMap {
    block_shift: u32,
    regions: Vec<MappedRegion>,
    fast: Option<FastPath>,
}

impl Default for AddressMap {
    fn default() -> Self {
        Self::new()
    }
}

impl AddressMap {
    /// An empty map with the default block granularity of 64.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            block_shift: DEFAULT_BLOCK_SIZE.trailing_zeros(),
            regions: Vec::new(),
            fast: None,
        }
    }

    /// An empty map with an explicit block granularity.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidBlockSize`] unless `block_size` is a
    /// power of two of at least two.
    pub fn with_block_size(block_size: u16) -> Result<Self, ConfigError> {
        if block_size < 2 || !block_size.is_power_of_two() {
            return Err(ConfigError::InvalidBlockSize(block_size));
        }
        Ok(Self {
            block_shift: block_size.trailing_zeros(),
            regions: Vec::new(),
            fast: None,
        })
    }

    /// The configured block granularity.
    #[must_use]
    pub const fn block_size(&self) -> u16 {
        1 << self.block_shift
    }

    /// Maps `[base, base + size)` to `resource`.
    ///
    /// A region starting at address 0 with a power-of-two size additionally
    /// arms the high-bit-mask fast path used by the main-RAM select; the fast
    /// path must decode identically to the general block algorithm (see
    /// [`Self::decode_blocks`]).
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ZeroSizeRegion`] for an empty region,
    /// [`ConfigError::RegionBelowBlockGranularity`] when the region spans no
    /// full decode block, and [`ConfigError::OverlappingRegions`] when its
    /// block range intersects an existing region.
    pub fn add_region(
        &mut self,
        base: u16,
        size: u16,
        resource: ResourceId,
    ) -> Result<(), ConfigError> {
        if size == 0 {
            return Err(ConfigError::ZeroSizeRegion { base });
        }
        let block_start = u32::from(base) >> self.block_shift;
        let block_end = (u32::from(base) + u32::from(size)) >> self.block_shift;
        if block_start == block_end {
            return Err(ConfigError::RegionBelowBlockGranularity { base, size });
        }
        if self
            .regions
            .iter()
            .any(|region| region.block_start < block_end && block_start < region.block_end)
        {
            return Err(ConfigError::OverlappingRegions { base, size });
        }
        if base == 0 && size.is_power_of_two() && size >= self.block_size() {
            self.fast = Some(FastPath {
                mask: !(size - 1),
                resource,
            });
        }
        self.regions.push(MappedRegion {
            base,
            size,
            block_start,
            block_end,
            resource,
        });
        Ok(())
    }

    /// Decodes an address to the resource it selects, or `None` when
    /// unmapped.
    ///
    /// Purely combinational: the result is recomputed from the address alone,
    /// with no memory of prior decodes.
    #[must_use]
    pub fn decode(&self, addr: u16) -> Option<ResourceId> {
        self.resolve(addr).map(|access| access.resource)
    }

    /// Decodes an address and translates it into the selected resource's
    /// zero-based frame.
    #[must_use]
    pub fn resolve(&self, addr: u16) -> Option<DecodedAccess> {
        if let Some(fast) = self.fast {
            if addr & fast.mask == 0 {
                return Some(DecodedAccess {
                    resource: fast.resource,
                    local: addr,
                });
            }
        }
        let block = u32::from(addr) >> self.block_shift;
        self.regions
            .iter()
            .find(|region| region.block_start <= block && block < region.block_end)
            .map(|region| DecodedAccess {
                resource: region.resource,
                local: addr.wrapping_sub(region.base),
            })
    }

    /// Decodes an address using the general block algorithm only, bypassing
    /// the main-RAM fast path.
    ///
    /// [`Self::decode`] is required to agree with this for every address; the
    /// fast path is a shortcut, not a semantic change.
    #[must_use]
    pub fn decode_blocks(&self, addr: u16) -> Option<ResourceId> {
        let block = u32::from(addr) >> self.block_shift;
        self.regions
            .iter()
            .find(|region| region.block_start <= block && block < region.block_end)
            .map(|region| region.resource)
    }

    /// Base address of the region backing `resource`, when mapped.
    #[must_use]
    pub fn base_of(&self, resource: ResourceId) -> Option<u16> {
        self.regions
            .iter()
            .find(|region| region.resource == resource)
            .map(|region| region.base)
    }

    /// Declared size of the region backing `resource`, when mapped.
    #[must_use]
    pub fn size_of(&self, resource: ResourceId) -> Option<u16> {
        self.regions
            .iter()
            .find(|region| region.resource == resource)
            .map(|region| region.size)
    }
}
