//! Vertex normal calculation.
//!
//! Normals are accumulated from the finest triangulation (LOD 0, no stitched
//! edges) of every patch. Face normals are added unnormalized, so larger triangles
//! weigh more, and the sums are normalized at the end. Coarser LODs draw the same
//! vertices and reuse these normals.

use cgmath::{InnerSpace, Vector3};

use crate::{
    engine_state::rendering::vertex::TerrainVertex,
    terrain::{
        index_library::{EdgeFlags, IndexBufferLibrary, LodKey, Winding},
        patch_grid::PatchLayout,
    },
};

/// Computes upward-facing normals for the shared vertex array.
///
/// # Arguments
/// * `vertices` - The grid's vertices, normals are overwritten
/// * `layout` - Patch layout the vertices were built for
/// * `library` - Index library built for the same layout
pub fn calc_normals(
    vertices: &mut [TerrainVertex],
    layout: &PatchLayout,
    library: &IndexBufferLibrary,
) {
    let mut sums = vec![Vector3::new(0.0f32, 0.0, 0.0); vertices.len()];
    let finest = library.variant_indices(LodKey::new(0, EdgeFlags::empty()));
    let sign = match library.winding() {
        Winding::CounterClockwise => 1.0,
        Winding::Clockwise => -1.0,
    };

    for (px, pz) in layout.patch_coords() {
        let base = layout.base_vertex_offset(px, pz) as usize;

        for tri in finest.chunks_exact(3) {
            let ids = [
                base + tri[0] as usize,
                base + tri[1] as usize,
                base + tri[2] as usize,
            ];
            let [p0, p1, p2] = ids.map(|i| Vector3::from(vertices[i].position));
            let face = (p1 - p0).cross(p2 - p0) * sign;

            for i in ids {
                sums[i] += face;
            }
        }
    }

    for (vertex, sum) in vertices.iter_mut().zip(sums) {
        if sum.magnitude2() > 0.0 {
            vertex.normal = sum.normalize().into();
        }
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;
    use crate::terrain::{
        height_source::{HeightMap, HeightSource},
        patch_grid::PatchGrid,
    };

    fn grid_with_normals(map: &HeightMap, patch_size: usize, winding: Winding) -> PatchGrid {
        let layout = PatchLayout::new(map.size(), map.size(), patch_size, 2.0).unwrap();
        let library = IndexBufferLibrary::build(&layout, winding);
        let mut grid = PatchGrid::build(layout, map, 1.0).unwrap();
        calc_normals(grid.vertices_mut(), &layout, &library);
        grid
    }

    #[test]
    fn flat_terrain_points_straight_up() {
        for winding in [Winding::CounterClockwise, Winding::Clockwise] {
            let map = HeightMap::flat(33, 5.0, 2.0, 1.0);
            let grid = grid_with_normals(&map, 17, winding);

            for vertex in grid.vertices() {
                assert_eq!(vertex.normal, [0.0, 1.0, 0.0]);
            }
        }
    }

    #[test]
    fn every_normal_is_unit_length() {
        let map = HeightMap::from_fn(17, 2.0, 1.0, |x, z| ((x * 7 + z * 13) % 11) as f32);
        let grid = grid_with_normals(&map, 9, Winding::CounterClockwise);

        for vertex in grid.vertices() {
            let n = Vector3::from(vertex.normal);
            assert_relative_eq!(n.magnitude(), 1.0, epsilon = 1e-5);
            assert!(n.y > 0.0);
        }
    }

    #[test]
    fn slope_tilts_normals_downhill() {
        // Height rises along +X, so normals lean towards -X.
        let map = HeightMap::from_fn(9, 2.0, 1.0, |x, _| x as f32 * 2.0);
        let grid = grid_with_normals(&map, 9, Winding::CounterClockwise);

        let n = Vector3::from(grid.vertices()[4 * 9 + 4].normal);
        let expected = Vector3::new(-1.0f32, 1.0, 0.0).normalize();
        assert_relative_eq!(n, expected, epsilon = 1e-5);
    }
}
