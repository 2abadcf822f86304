use crate::foundation::core::DeviceRect;
use crate::render::block::BlockId;
use crate::render::tile::TileHandle;
use indexmap::IndexMap;

/// One block's tile: where it goes and the (possibly still pending) raster.
#[derive(Clone, Debug)]
pub struct TileEntry {
    /// Device rectangle the tile covers.
    pub bounds: DeviceRect,
    /// The tile itself.
    pub handle: TileHandle,
}

/// Insertion-ordered map from block identity to tile entry for one pass.
///
/// Insertion order is z-order: the first entry is composited at the bottom. The renderer keeps
/// the latest pass's `AssemblyInfo` as its tile cache. Not synchronized; all mutation happens
/// under the renderer lock.
#[derive(Clone, Debug, Default)]
pub struct AssemblyInfo {
    entries: IndexMap<BlockId, TileEntry>,
}

impl AssemblyInfo {
    /// An empty assembly.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether an entry exists for `id`.
    pub fn contains(&self, id: BlockId) -> bool {
        self.entries.contains_key(&id)
    }

    /// Entry for `id`.
    pub fn get(&self, id: BlockId) -> Option<&TileEntry> {
        self.entries.get(&id)
    }

    /// Append an entry on top of the current ones.
    ///
    /// Identities are unique: putting an existing `id` replaces its entry in place (keeping its
    /// z-position) and returns the old one.
    pub fn put(&mut self, id: BlockId, bounds: DeviceRect, handle: TileHandle) -> Option<TileEntry> {
        self.entries.insert(id, TileEntry { bounds, handle })
    }

    /// Entries bottom to top.
    pub fn iter(&self) -> impl Iterator<Item = (BlockId, &TileEntry)> {
        self.entries.iter().map(|(id, e)| (*id, e))
    }

    /// Block identities bottom to top.
    pub fn ids(&self) -> Vec<BlockId> {
        self.entries.keys().copied().collect()
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether there are no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether any entry holds exactly this tile.
    pub fn holds(&self, handle: &TileHandle) -> bool {
        self.entries.values().any(|e| e.handle.same_tile(handle))
    }
}

#[cfg(test)]
#[path = "../../tests/unit/render/cache.rs"]
mod tests;
