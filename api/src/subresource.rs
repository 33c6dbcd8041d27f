use serde::{Deserialize, Serialize};

/// A set of mip levels and array layers of an image.
///
/// Counts may exceed what the image actually has; [`SubresourceRange::resolve`] clamps them.
#[derive(Debug, Serialize, Deserialize, Copy, Clone, PartialEq, Eq, Hash)]
pub struct SubresourceRange {
    pub base_mip: u32,
    pub mip_count: u32,
    pub base_layer: u32,
    pub layer_count: u32,
}

impl SubresourceRange {
    /// Every subresource of the image.
    pub const ALL: Self = Self {
        base_mip: 0,
        mip_count: u32::MAX,
        base_layer: 0,
        layer_count: u32::MAX,
    };

    #[inline(always)]
    pub const fn single(mip: u32, layer: u32) -> Self {
        Self {
            base_mip: mip,
            mip_count: 1,
            base_layer: layer,
            layer_count: 1,
        }
    }

    /// A run of mip levels across every array layer.
    #[inline(always)]
    pub const fn mips(base_mip: u32, mip_count: u32) -> Self {
        Self {
            base_mip,
            mip_count,
            base_layer: 0,
            layer_count: u32::MAX,
        }
    }

    /// Clamps the range to an image with the given number of mips and layers.
    pub fn resolve(self, mip_levels: u32, array_layers: u32) -> Self {
        let base_mip = self.base_mip.min(mip_levels);
        let base_layer = self.base_layer.min(array_layers);
        let last_mip = base_mip.saturating_add(self.mip_count).min(mip_levels);
        let last_layer = base_layer.saturating_add(self.layer_count).min(array_layers);

        Self {
            base_mip,
            mip_count: last_mip - base_mip,
            base_layer,
            layer_count: last_layer - base_layer,
        }
    }

    /// `true` if the range, once resolved, covers every subresource of the image.
    #[inline(always)]
    pub fn is_entire(self, mip_levels: u32, array_layers: u32) -> bool {
        let resolved = self.resolve(mip_levels, array_layers);
        resolved.base_mip == 0
            && resolved.mip_count == mip_levels
            && resolved.base_layer == 0
            && resolved.layer_count == array_layers
    }

    #[inline(always)]
    pub fn is_empty(self) -> bool {
        self.mip_count == 0 || self.layer_count == 0
    }

    /// Iterates `(mip, layer)` pairs, layer-major. The range should be resolved first.
    pub fn iter(self) -> impl Iterator<Item = (u32, u32)> {
        (self.base_layer..self.base_layer + self.layer_count).flat_map(move |layer| {
            (self.base_mip..self.base_mip + self.mip_count).map(move |mip| (mip, layer))
        })
    }
}

impl Default for SubresourceRange {
    fn default() -> Self {
        Self::ALL
    }
}

/// Index of a `(mip, layer)` slot in a per-subresource state array.
#[inline(always)]
pub fn subresource_index(mip: u32, layer: u32, mip_levels: u32) -> usize {
    (mip + layer * mip_levels) as usize
}
