//! # Index Buffer Library
//!
//! Precomputes the triangulation of a patch for every combination of core LOD and
//! coarser-neighbor edge flags, and packs all of them into one shared index array.
//!
//! ## Triangulation
//!
//! At LOD `L` the patch is sampled every `s = 2^L` vertices. The quads are grouped
//! into `2s x 2s` blocks, and each block is drawn as a fan of eight triangles
//! around its center vertex, walking the block perimeter:
//!
//! ```text
//!   p2 ---- p3 ---- p4
//!    | \    |    / |
//!    |   \  |  /   |
//!   p1 ---- C ---- p5
//!    |   /  |  \   |
//!    | /    |    \ |
//!   p0 ---- p7 ---- p6
//! ```
//!
//! When a block side lies on a patch side whose neighbor is one level coarser, the
//! side midpoint is skipped and its two triangles become one. The border then only
//! uses every `2s`-th vertex, exactly the vertices the coarser neighbor draws, so
//! no T-junction cracks appear. At the coarsest level the patch is a single quad
//! split in two, and the edge flags have no effect.
//!
//! ## Index Convention
//!
//! Indices are patch-relative offsets into the global row-major vertex array
//! (`local_z * width + local_x`). One library therefore serves every patch: a draw
//! only adds the patch's base vertex offset.

use std::collections::HashMap;
use std::ops::Range;

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use crate::terrain::patch_grid::PatchLayout;

bitflags! {
    /// Sides of a patch whose neighbor is one LOD level coarser.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct EdgeFlags: u8 {
        /// -X side (local x = 0)
        const LEFT = 1 << 0;
        /// +X side (local x = patch_size - 1)
        const RIGHT = 1 << 1;
        /// +Z side (local z = patch_size - 1)
        const TOP = 1 << 2;
        /// -Z side (local z = 0)
        const BOTTOM = 1 << 3;
    }
}

/// Number of distinct edge flag combinations.
pub const EDGE_COMBINATIONS: u8 = 16;

/// Lookup key of one index buffer variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LodKey {
    pub core: u32,
    pub edges: EdgeFlags,
}

impl LodKey {
    pub fn new(core: u32, edges: EdgeFlags) -> Self {
        Self { core, edges }
    }
}

/// A contiguous run of the shared index array.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct IndexSlice {
    pub start: u32,
    pub count: u32,
}

impl IndexSlice {
    pub fn range(&self) -> Range<u32> {
        self.start..self.start + self.count
    }
}

/// Triangle winding as seen from above (+Y).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Winding {
    #[default]
    CounterClockwise,
    Clockwise,
}

/// Destination of generated triangles.
///
/// `cursor` is the number of indices emitted so far. Implementations return the
/// cursor after the triangle has been appended.
pub trait TriangleSink {
    fn add_triangle(&mut self, cursor: u32, triangle: [u32; 3]) -> u32;
}

/// Counts indices without storing them.
struct CountingSink;

impl TriangleSink for CountingSink {
    fn add_triangle(&mut self, cursor: u32, _triangle: [u32; 3]) -> u32 {
        cursor + 3
    }
}

/// Writes indices into a pre-sized buffer.
struct WritingSink<'a> {
    indices: &'a mut [u32],
}

impl TriangleSink for WritingSink<'_> {
    fn add_triangle(&mut self, cursor: u32, triangle: [u32; 3]) -> u32 {
        let at = cursor as usize;
        self.indices[at..at + 3].copy_from_slice(&triangle);
        cursor + 3
    }
}

/// Emits the triangles of every variant, in buffer order, into a sink.
struct VariantWriter {
    patch_size: u32,
    width: u32,
    winding: Winding,
}

impl VariantWriter {
    fn local_index(&self, x: u32, z: u32) -> u32 {
        z * self.width + x
    }

    fn triangle<S: TriangleSink>(
        &self,
        sink: &mut S,
        cursor: u32,
        v0: (u32, u32),
        v1: (u32, u32),
        v2: (u32, u32),
    ) -> u32 {
        let (v1, v2) = match self.winding {
            Winding::CounterClockwise => (v1, v2),
            Winding::Clockwise => (v2, v1),
        };
        sink.add_triangle(
            cursor,
            [
                self.local_index(v0.0, v0.1),
                self.local_index(v1.0, v1.1),
                self.local_index(v2.0, v2.1),
            ],
        )
    }

    fn variant<S: TriangleSink>(
        &self,
        sink: &mut S,
        mut cursor: u32,
        lod: u32,
        edges: EdgeFlags,
    ) -> u32 {
        let step = 1u32 << lod;
        let last = self.patch_size - 1;

        if last / step == 1 {
            cursor = self.triangle(sink, cursor, (0, 0), (0, last), (last, last));
            return self.triangle(sink, cursor, (0, 0), (last, last), (last, 0));
        }

        let block = 2 * step;
        for z in (0..last).step_by(block as usize) {
            for x in (0..last).step_by(block as usize) {
                cursor = self.block_fan(sink, cursor, x, z, step, edges);
            }
        }
        cursor
    }

    fn block_fan<S: TriangleSink>(
        &self,
        sink: &mut S,
        mut cursor: u32,
        x: u32,
        z: u32,
        step: u32,
        edges: EdgeFlags,
    ) -> u32 {
        let last = self.patch_size - 1;
        let (x1, x2) = (x + step, x + 2 * step);
        let (z1, z2) = (z + step, z + 2 * step);
        let center = (x1, z1);

        let sides = [
            ((x, z), (x, z1), (x, z2), x == 0 && edges.contains(EdgeFlags::LEFT)),
            ((x, z2), (x1, z2), (x2, z2), z2 == last && edges.contains(EdgeFlags::TOP)),
            ((x2, z2), (x2, z1), (x2, z), x2 == last && edges.contains(EdgeFlags::RIGHT)),
            ((x2, z), (x1, z), (x, z), z == 0 && edges.contains(EdgeFlags::BOTTOM)),
        ];

        for (start, mid, end, stitched) in sides {
            if stitched {
                cursor = self.triangle(sink, cursor, center, start, end);
            } else {
                cursor = self.triangle(sink, cursor, center, start, mid);
                cursor = self.triangle(sink, cursor, center, mid, end);
            }
        }
        cursor
    }
}

/// Every `(core LOD, edge flags)` triangulation of a patch, packed into one array.
#[derive(Debug, Clone)]
pub struct IndexBufferLibrary {
    indices: Vec<u32>,
    slices: HashMap<LodKey, IndexSlice>,
    order: Vec<(LodKey, IndexSlice)>,
    max_lod: u32,
    winding: Winding,
}

impl IndexBufferLibrary {
    /// Generates all `(max_lod + 1) * 16` variants for the given layout.
    ///
    /// A counting pass sizes the shared array, then a writing pass fills it and
    /// records each variant's slice.
    pub fn build(layout: &PatchLayout, winding: Winding) -> Self {
        let writer = VariantWriter {
            patch_size: layout.patch_size() as u32,
            width: layout.width() as u32,
            winding,
        };
        let max_lod = layout.max_lod();

        let mut counter = CountingSink;
        let total = Self::keys(max_lod).fold(0, |cursor, key| {
            writer.variant(&mut counter, cursor, key.core, key.edges)
        });

        let mut indices = vec![0u32; total as usize];
        let mut sink = WritingSink {
            indices: &mut indices,
        };
        let mut slices = HashMap::with_capacity(((max_lod + 1) * EDGE_COMBINATIONS as u32) as usize);
        let mut order = Vec::with_capacity(slices.capacity());

        let mut cursor = 0;
        for key in Self::keys(max_lod) {
            let start = cursor;
            cursor = writer.variant(&mut sink, cursor, key.core, key.edges);
            let slice = IndexSlice {
                start,
                count: cursor - start,
            };
            slices.insert(key, slice);
            order.push((key, slice));
        }
        debug_assert_eq!(cursor, total);

        Self {
            indices,
            slices,
            order,
            max_lod,
            winding,
        }
    }

    /// All keys in buffer order: core LOD outer, edge flag bits inner.
    fn keys(max_lod: u32) -> impl Iterator<Item = LodKey> {
        (0..=max_lod).flat_map(|core| {
            (0..EDGE_COMBINATIONS).map(move |bits| LodKey {
                core,
                edges: EdgeFlags::from_bits_truncate(bits),
            })
        })
    }

    /// Slice of the variant for `key`. Every key resolves: the core LOD is clamped
    /// to `max_lod` and unknown flag bits are ignored.
    pub fn slice(&self, key: LodKey) -> IndexSlice {
        let key = LodKey {
            core: key.core.min(self.max_lod),
            edges: key.edges & EdgeFlags::all(),
        };
        self.slices[&key]
    }

    pub fn indices(&self) -> &[u32] {
        &self.indices
    }

    pub fn total_indices(&self) -> usize {
        self.indices.len()
    }

    /// Variants in buffer order.
    pub fn variants(&self) -> impl Iterator<Item = (LodKey, IndexSlice)> + '_ {
        self.order.iter().copied()
    }

    pub fn variant_count(&self) -> usize {
        self.order.len()
    }

    pub fn max_lod(&self) -> u32 {
        self.max_lod
    }

    pub fn winding(&self) -> Winding {
        self.winding
    }

    /// Indices of a single variant.
    pub fn variant_indices(&self, key: LodKey) -> &[u32] {
        let slice = self.slice(key);
        &self.indices[slice.start as usize..(slice.start + slice.count) as usize]
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use super::*;

    fn library(width: usize, patch_size: usize, winding: Winding) -> (PatchLayout, IndexBufferLibrary) {
        let layout = PatchLayout::new(width, width, patch_size, 1.0).unwrap();
        let library = IndexBufferLibrary::build(&layout, winding);
        (layout, library)
    }

    fn decode(layout: &PatchLayout, index: u32) -> (i64, i64) {
        let w = layout.width() as u32;
        ((index % w) as i64, (index / w) as i64)
    }

    /// Twice the signed area of a triangle in the XZ plane, positive when its
    /// normal points up.
    fn signed_area2(layout: &PatchLayout, tri: &[u32]) -> i64 {
        let (x0, z0) = decode(layout, tri[0]);
        let (x1, z1) = decode(layout, tri[1]);
        let (x2, z2) = decode(layout, tri[2]);
        let (ax, az) = (x1 - x0, z1 - z0);
        let (bx, bz) = (x2 - x0, z2 - z0);
        az * bx - ax * bz
    }

    fn edge_vertices(layout: &PatchLayout, indices: &[u32], on_edge: impl Fn(i64, i64) -> Option<i64>) -> BTreeSet<i64> {
        indices
            .iter()
            .filter_map(|&i| {
                let (x, z) = decode(layout, i);
                on_edge(x, z)
            })
            .collect()
    }

    #[test]
    fn single_patch_scenario() {
        let (layout, library) = library(17, 17, Winding::CounterClockwise);

        assert_eq!(library.max_lod(), 4);
        assert_eq!(library.variant_count(), 80);

        let mut expected_start = 0;
        for (key, slice) in library.variants() {
            assert_eq!(slice.start, expected_start, "{key:?} is not contiguous");
            assert!(slice.count > 0);
            assert_eq!(slice.count % 3, 0);
            expected_start += slice.count;
        }
        assert_eq!(expected_start as usize, library.total_indices());

        for &index in library.indices() {
            let (x, z) = decode(&layout, index);
            assert!(x < 17 && z < 17);
        }
    }

    #[test]
    fn every_key_resolves() {
        let (_, library) = library(33, 17, Winding::CounterClockwise);

        for core in 0..=library.max_lod() {
            for bits in 0..EDGE_COMBINATIONS {
                let key = LodKey::new(core, EdgeFlags::from_bits_truncate(bits));
                assert_eq!(library.slice(key), library.slices[&key]);
            }
        }

        let clamped = library.slice(LodKey::new(99, EdgeFlags::LEFT));
        assert_eq!(clamped, library.slice(LodKey::new(4, EdgeFlags::LEFT)));
    }

    #[test]
    fn variants_tile_the_patch() {
        for patch_size in [3, 5, 9, 17] {
            let (layout, library) = library(2 * patch_size - 1, patch_size, Winding::CounterClockwise);
            let expected = 2 * ((patch_size - 1) * (patch_size - 1)) as i64;

            for (key, _) in library.variants() {
                let mut total = 0;
                for tri in library.variant_indices(key).chunks(3) {
                    let area2 = signed_area2(&layout, tri);
                    assert!(area2 > 0, "{key:?} has a degenerate or flipped triangle");
                    total += area2;
                }
                assert_eq!(total, expected, "{key:?} does not cover the patch");
            }
        }
    }

    #[test]
    fn triangle_counts_per_variant() {
        let (_, library) = library(17, 17, Winding::CounterClockwise);

        for (key, slice) in library.variants() {
            let triangles = slice.count / 3;
            if key.core == library.max_lod() {
                assert_eq!(triangles, 2);
                continue;
            }
            let quads = 16 >> key.core;
            let stitched_sides = key.edges.bits().count_ones();
            assert_eq!(triangles, 2 * quads * quads - stitched_sides * quads / 2);
        }
    }

    #[test]
    fn lod_uses_its_stride() {
        let (layout, library) = library(17, 17, Winding::CounterClockwise);

        for lod in 0..=library.max_lod() {
            let stride = 1i64 << lod;
            for &index in library.variant_indices(LodKey::new(lod, EdgeFlags::empty())) {
                let (x, z) = decode(&layout, index);
                assert_eq!(x % stride, 0);
                assert_eq!(z % stride, 0);
            }
        }
    }

    #[test]
    fn stitched_borders_use_coarser_stride() {
        let (layout, library) = library(33, 17, Winding::CounterClockwise);
        let last = 16;

        for lod in 0..library.max_lod() {
            let coarse = 2i64 << lod;
            let indices = library.variant_indices(LodKey::new(lod, EdgeFlags::all()));
            for &index in indices {
                let (x, z) = decode(&layout, index);
                if x == 0 || x == last {
                    assert_eq!(z % coarse, 0, "lod {lod} side vertex ({x}, {z})");
                }
                if z == 0 || z == last {
                    assert_eq!(x % coarse, 0, "lod {lod} side vertex ({x}, {z})");
                }
            }
        }
    }

    #[test]
    fn stitched_edge_matches_coarser_neighbor() {
        let (layout, library) = library(17, 17, Winding::CounterClockwise);
        let last = 16;

        for lod in 0..library.max_lod() {
            let fine = library.variant_indices(LodKey::new(lod, EdgeFlags::RIGHT));
            let coarse = library.variant_indices(LodKey::new(lod + 1, EdgeFlags::empty()));

            let fine_right = edge_vertices(&layout, fine, |x, z| (x == last).then_some(z));
            let coarse_left = edge_vertices(&layout, coarse, |x, z| (x == 0).then_some(z));
            assert_eq!(fine_right, coarse_left);

            let fine = library.variant_indices(LodKey::new(lod, EdgeFlags::BOTTOM));
            let fine_bottom = edge_vertices(&layout, fine, |x, z| (z == 0).then_some(x));
            let coarse_top = edge_vertices(&layout, coarse, |x, z| (z == last).then_some(x));
            assert_eq!(fine_bottom, coarse_top);
        }
    }

    #[test]
    fn coarsest_level_ignores_flags() {
        let (_, library) = library(17, 17, Winding::CounterClockwise);
        let plain = library.variant_indices(LodKey::new(4, EdgeFlags::empty()));

        for bits in 1..EDGE_COMBINATIONS {
            let key = LodKey::new(4, EdgeFlags::from_bits_truncate(bits));
            assert_eq!(library.variant_indices(key), plain);
            assert_ne!(library.slice(key).start, library.slice(LodKey::new(4, EdgeFlags::empty())).start);
        }
    }

    #[test]
    fn clockwise_winding_flips_every_triangle() {
        let (layout, ccw) = library(17, 9, Winding::CounterClockwise);
        let (_, cw) = library(17, 9, Winding::Clockwise);

        assert_eq!(ccw.total_indices(), cw.total_indices());
        for (a, b) in ccw.indices().chunks(3).zip(cw.indices().chunks(3)) {
            assert_eq!([a[0], a[2], a[1]], [b[0], b[1], b[2]]);
            assert!(signed_area2(&layout, b) < 0);
        }
    }

    #[test]
    fn indices_use_grid_width_as_row_pitch() {
        let layout = PatchLayout::new(49, 17, 17, 1.0).unwrap();
        let library = IndexBufferLibrary::build(&layout, Winding::CounterClockwise);

        let max = library.indices().iter().copied().max().unwrap();
        assert_eq!(max, 16 * 49 + 16);
    }

    #[test]
    fn counting_and_writing_sinks_agree() {
        let mut counter = CountingSink;
        let mut buffer = [0u32; 6];
        let mut writer = WritingSink { indices: &mut buffer };

        assert_eq!(counter.add_triangle(3, [1, 2, 3]), 6);
        let cursor = writer.add_triangle(0, [1, 2, 3]);
        assert_eq!(writer.add_triangle(cursor, [4, 5, 6]), 6);
        assert_eq!(buffer, [1, 2, 3, 4, 5, 6]);
    }
}
