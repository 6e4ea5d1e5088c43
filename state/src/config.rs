// Copyright 2018 Kodebox, Inc.
// This file is part of CodeChain.
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as
// published by the Free Software Foundation, either version 3 of the
// License, or (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

/// Default cap on snapshot-tree diff-layer depth (section 4.8 step 7).
pub const DEFAULT_DIFF_LAYER_CAP: u64 = 128;

/// Construction-time knobs for a `StateDb`. Immutable for the life of the
/// instance.
#[derive(Debug, Clone)]
pub struct StateConfig {
    /// When set, `IntermediateRoot` iterates the mutation index and dirty
    /// storage in address/slot-sorted order so that `Commit` is reproducible
    /// across runs given the same mutation multiset (section 8, property 4).
    pub deterministic: bool,
    /// Maximum depth of the snapshot tree's diff-layer chain before older
    /// layers are flattened into the disk layer.
    pub diff_layer_cap: u64,
    /// Worker count for the trie prefetcher's background address-warming.
    pub prefetch_workers: usize,
    /// Worker count for `Commit`'s concurrent storage-trie fan-out.
    pub commit_workers: usize,
}

impl Default for StateConfig {
    fn default() -> Self {
        StateConfig {
            deterministic: false,
            diff_layer_cap: DEFAULT_DIFF_LAYER_CAP,
            prefetch_workers: 4,
            commit_workers: 4,
        }
    }
}
