//! # Draw List
//!
//! Turns a frame's LOD map and visibility test into an ordered list of per-patch
//! draws, and submits that list to a draw backend. The GPU backend lives in
//! [`crate::engine_state::rendering::terrain_renderer`]; tests use
//! [`RecordingBackend`].

use std::ops::Range;

use bitvec::prelude::BitVec;

use crate::terrain::{
    culling::FrustumCuller, index_library::LodKey, lod::LodMap, CompiledTerrain,
};

/// One indexed draw of a single patch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchDraw {
    pub patch: (usize, usize),
    pub key: LodKey,
    /// Range of the shared index buffer
    pub indices: Range<u32>,
    /// Added to every index to reach the patch's vertices
    pub base_vertex: i32,
}

/// Counters describing one frame of terrain drawing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FrameStats {
    pub total_patches: usize,
    pub visible_patches: usize,
    pub culled_patches: usize,
    pub draw_calls: usize,
    pub indices: usize,
    /// Drawn patches per core LOD
    pub lod_histogram: Vec<usize>,
    pub clamped_edges: usize,
}

/// The draws of one frame, in row-major patch order.
#[derive(Debug, Clone)]
pub struct DrawList {
    pub draws: Vec<PatchDraw>,
    pub stats: FrameStats,
    visibility: BitVec,
    num_patches_x: usize,
}

impl DrawList {
    /// Whether the patch passed the visibility test this frame.
    pub fn is_visible(&self, px: usize, pz: usize) -> bool {
        self.visibility[pz * self.num_patches_x + px]
    }
}

/// Builds the frame's draw list.
///
/// Patches are visited row-major (`pz` outer, `px` inner). Each visible patch gets
/// one draw of the index variant matching its LOD and edge flags.
pub fn build_draw_list(
    terrain: &CompiledTerrain,
    lod_map: &LodMap,
    culler: &FrustumCuller,
) -> DrawList {
    let layout = terrain.layout();
    let library = terrain.library();

    let mut visibility = BitVec::repeat(false, layout.patch_count());
    let mut draws = Vec::new();
    let mut stats = FrameStats {
        total_patches: layout.patch_count(),
        lod_histogram: vec![0; library.max_lod() as usize + 1],
        clamped_edges: lod_map.clamped_edges(),
        ..Default::default()
    };

    for (px, pz) in layout.patch_coords() {
        if !culler.is_visible(terrain.grid().patch_bounds(px, pz)) {
            continue;
        }
        visibility.set(layout.patch_index(px, pz), true);

        let key = lod_map.get(px, pz).key();
        let slice = library.slice(key);

        stats.indices += slice.count as usize;
        stats.lod_histogram[key.core.min(library.max_lod()) as usize] += 1;
        draws.push(PatchDraw {
            patch: (px, pz),
            key,
            indices: slice.range(),
            base_vertex: layout.base_vertex_offset(px, pz),
        });
    }

    stats.visible_patches = draws.len();
    stats.culled_patches = stats.total_patches - stats.visible_patches;
    stats.draw_calls = draws.len();

    DrawList {
        draws,
        stats,
        visibility,
        num_patches_x: layout.num_patches_x(),
    }
}

/// Something that can issue one indexed draw of the shared terrain buffers.
pub trait PatchDrawBackend {
    fn draw_patch(&mut self, indices: Range<u32>, base_vertex: i32);
}

/// Issues exactly one draw per entry, in list order.
pub fn submit<B: PatchDrawBackend + ?Sized>(draw_list: &DrawList, backend: &mut B) {
    for draw in &draw_list.draws {
        backend.draw_patch(draw.indices.clone(), draw.base_vertex);
    }
}

/// Backend that records draw calls instead of issuing them.
#[derive(Debug, Default)]
pub struct RecordingBackend {
    pub calls: Vec<(Range<u32>, i32)>,
}

impl PatchDrawBackend for RecordingBackend {
    fn draw_patch(&mut self, indices: Range<u32>, base_vertex: i32) {
        self.calls.push((indices, base_vertex));
    }
}

#[cfg(test)]
mod tests {
    use cgmath::{perspective, Deg, Matrix4, Point3, SquareMatrix, Vector3};

    use super::*;
    use crate::{
        engine_state::camera_state::camera::OPENGL_TO_WGPU_MATRIX,
        terrain::{
            culling::CullingStrategy, height_source::HeightMap, index_library::Winding,
            lod::LodConfig, patch_grid::PatchLayout,
        },
    };

    fn terrain() -> CompiledTerrain {
        let layout = PatchLayout::new(65, 49, 17, 1.0).unwrap();
        let map = HeightMap::flat(65, 0.0, 1.0, 1.0);
        CompiledTerrain::compile(layout, &map, 1.0, &LodConfig::default(), Winding::CounterClockwise)
            .unwrap()
    }

    /// A culler that sees everything: clip space equals world space, and every
    /// patch sits inside the unit cube.
    fn see_all() -> FrustumCuller {
        let squash = Matrix4::from_nonuniform_scale(1.0 / 100.0, 1.0 / 100.0, 1.0 / 100.0);
        let shift = Matrix4::from_translation(Vector3::new(-0.5, 0.0, 0.0));
        FrustumCuller::new(CullingStrategy::WorldSpace, shift * squash)
    }

    #[test]
    fn every_visible_patch_is_drawn_row_major() {
        let terrain = terrain();
        let lod_map = terrain.select_lod(Point3::new(8.0, 10.0, 8.0));
        let list = build_draw_list(&terrain, &lod_map, &see_all());

        let patches: Vec<_> = list.draws.iter().map(|d| d.patch).collect();
        let expected: Vec<_> = terrain.layout().patch_coords().collect();
        assert_eq!(patches, expected);
        assert_eq!(list.stats.draw_calls, 12);
        assert_eq!(list.stats.culled_patches, 0);

        for draw in &list.draws {
            let (px, pz) = draw.patch;
            assert_eq!(draw.key, lod_map.get(px, pz).key());
            assert_eq!(draw.indices, terrain.library().slice(draw.key).range());
            assert_eq!(draw.base_vertex, (pz * 16 * 65 + px * 16) as i32);
        }

        let drawn: usize = list.stats.lod_histogram.iter().sum();
        assert_eq!(drawn, 12);
        assert_eq!(
            list.stats.indices,
            list.draws.iter().map(|d| d.indices.len()).sum::<usize>()
        );
    }

    #[test]
    fn culled_patches_are_skipped() {
        let terrain = terrain();
        let lod_map = terrain.select_lod(Point3::new(0.0, 10.0, 0.0));

        // Looking down +X from the middle of the first patch row, at ground level.
        let projection = OPENGL_TO_WGPU_MATRIX * perspective(Deg(30.0), 1.0, 1.0, 1000.0);
        let view = Matrix4::look_to_rh(
            Point3::new(-10.0, 0.0, 8.0),
            Vector3::unit_x(),
            Vector3::unit_y(),
        );
        let culler = FrustumCuller::new(CullingStrategy::ViewSpace, projection * view);
        let list = build_draw_list(&terrain, &lod_map, &culler);

        assert!(list.stats.visible_patches > 0);
        assert!(list.stats.culled_patches > 0);
        for draw in &list.draws {
            assert!(list.is_visible(draw.patch.0, draw.patch.1));
        }
        assert!(list.is_visible(0, 0));
        assert!(!list.is_visible(0, 2));
    }

    #[test]
    fn submit_issues_one_call_per_draw_in_order() {
        let terrain = terrain();
        let lod_map = terrain.select_lod(Point3::new(30.0, 10.0, 30.0));
        let list = build_draw_list(&terrain, &lod_map, &see_all());

        let mut backend = RecordingBackend::default();
        submit(&list, &mut backend);

        let expected: Vec<_> = list
            .draws
            .iter()
            .map(|d| (d.indices.clone(), d.base_vertex))
            .collect();
        assert_eq!(backend.calls, expected);
    }

    #[test]
    fn identity_view_keeps_the_origin_patch() {
        let terrain = terrain();
        let lod_map = terrain.select_lod(Point3::new(0.0, 0.0, 0.0));
        let culler = FrustumCuller::new(CullingStrategy::ViewSpace, Matrix4::identity());
        let list = build_draw_list(&terrain, &lod_map, &culler);

        assert_eq!(list.draws.len(), 1);
        assert_eq!(list.draws[0].patch, (0, 0));
    }
}
