//! # LOD Selection
//!
//! Maps a camera position to a per-patch level of detail and the matching edge
//! flags. Selection is a pure function of the camera position: [`LodSelector`] is
//! built once per terrain and holds no per-frame state.
//!
//! ## Distance Regions
//!
//! The view distance `z_far` is split into `max_lod + 1` concentric regions whose
//! widths grow linearly (`1, 2, 3, ...` units), so detail falls off faster close to
//! the camera. A patch takes the first region its center is closer than. Explicit
//! thresholds can replace the derived regions.
//!
//! ## Neighbor Gaps
//!
//! The index library can only stitch a patch to a neighbor one level coarser.
//! With `limit_neighbor_gap` (the default) a relaxation pass lowers patches until
//! every adjacent pair is within one level. Without it, larger gaps are stitched as
//! if the neighbor were one level coarser and counted in [`LodMap::clamped_edges`].

use cgmath::Point3;
use serde::{Deserialize, Serialize};

use crate::{
    error::{TerrainError, TerrainResult},
    terrain::{
        index_library::{EdgeFlags, LodKey},
        patch_grid::PatchLayout,
    },
};

/// LOD distance configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LodConfig {
    /// Distance covered by the derived regions
    pub z_far: f32,
    /// Explicit region limits, strictly increasing, overriding `z_far`
    pub thresholds: Option<Vec<f32>>,
    /// Keep adjacent patches within one LOD level of each other
    pub limit_neighbor_gap: bool,
}

impl Default for LodConfig {
    fn default() -> Self {
        Self {
            z_far: 5000.0,
            thresholds: None,
            limit_neighbor_gap: true,
        }
    }
}

impl LodConfig {
    pub fn validate(&self) -> TerrainResult<()> {
        match &self.thresholds {
            Some(thresholds) => {
                let increasing = thresholds.windows(2).all(|w| w[0] < w[1]);
                if thresholds.is_empty()
                    || !increasing
                    || thresholds.iter().any(|t| !t.is_finite())
                {
                    return Err(TerrainError::InvalidLodThresholds);
                }
            }
            None => {
                if !self.z_far.is_finite() || self.z_far <= 0.0 {
                    return Err(TerrainError::InvalidLodThresholds);
                }
            }
        }
        Ok(())
    }

    /// Region limits for a terrain whose coarsest level is `max_lod`.
    pub fn regions(&self, max_lod: u32) -> TerrainResult<Vec<f32>> {
        self.validate()?;

        if let Some(thresholds) = &self.thresholds {
            return Ok(thresholds.clone());
        }

        let sum: u32 = (0..=max_lod).map(|i| i + 1).sum();
        let unit = self.z_far / sum as f32;

        let mut limit = 0.0;
        Ok((0..=max_lod)
            .map(|i| {
                limit += unit * (i + 1) as f32;
                limit
            })
            .collect())
    }
}

/// Selected detail of one patch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PatchLod {
    pub core: u32,
    pub edges: EdgeFlags,
}

impl PatchLod {
    pub fn key(&self) -> LodKey {
        LodKey::new(self.core, self.edges)
    }
}

/// Per-patch LOD selection for one frame, row-major.
#[derive(Debug, Clone, PartialEq)]
pub struct LodMap {
    num_patches_x: usize,
    num_patches_z: usize,
    max_lod: u32,
    patches: Vec<PatchLod>,
    clamped_edges: usize,
}

impl LodMap {
    pub fn get(&self, px: usize, pz: usize) -> PatchLod {
        self.patches[pz * self.num_patches_x + px]
    }

    pub fn patches(&self) -> &[PatchLod] {
        &self.patches
    }

    pub fn num_patches_x(&self) -> usize {
        self.num_patches_x
    }

    pub fn num_patches_z(&self) -> usize {
        self.num_patches_z
    }

    /// Patch sides whose neighbor was two or more levels coarser.
    pub fn clamped_edges(&self) -> usize {
        self.clamped_edges
    }

    /// Number of patches at each core LOD, indexed by level.
    pub fn lod_histogram(&self) -> Vec<usize> {
        let mut histogram = vec![0; self.max_lod as usize + 1];
        for patch in &self.patches {
            histogram[patch.core as usize] += 1;
        }
        histogram
    }
}

/// Chooses per-patch LODs from the camera position.
#[derive(Debug, Clone)]
pub struct LodSelector {
    layout: PatchLayout,
    regions: Vec<f32>,
    limit_neighbor_gap: bool,
}

impl LodSelector {
    pub fn new(layout: &PatchLayout, config: &LodConfig) -> TerrainResult<Self> {
        Ok(Self {
            layout: *layout,
            regions: config.regions(layout.max_lod())?,
            limit_neighbor_gap: config.limit_neighbor_gap,
        })
    }

    pub fn regions(&self) -> &[f32] {
        &self.regions
    }

    /// Core LOD of a single patch, before any neighbor adjustment.
    pub fn core_lod(&self, px: usize, pz: usize, camera: Point3<f32>) -> u32 {
        let max_lod = self.layout.max_lod();

        let (min_x, min_z, max_x, max_z) = self.layout.footprint(px, pz);
        if (min_x..=max_x).contains(&camera.x) && (min_z..=max_z).contains(&camera.z) {
            return 0;
        }

        let (center_x, center_z) = self.layout.patch_center(px, pz);
        let distance = (camera.x - center_x).hypot(camera.z - center_z);

        self.regions
            .iter()
            .position(|&limit| distance < limit)
            .map_or(max_lod, |i| (i as u32).min(max_lod))
    }

    /// Selects every patch's core LOD and edge flags for a camera position.
    pub fn select(&self, camera: Point3<f32>) -> LodMap {
        let num_x = self.layout.num_patches_x();
        let num_z = self.layout.num_patches_z();

        let mut cores: Vec<u32> = self
            .layout
            .patch_coords()
            .map(|(px, pz)| self.core_lod(px, pz, camera))
            .collect();

        if self.limit_neighbor_gap {
            limit_gaps(&mut cores, num_x, num_z);
        }

        let mut clamped_edges = 0;
        let mut patches = Vec::with_capacity(cores.len());

        for (px, pz) in self.layout.patch_coords() {
            let core = cores[pz * num_x + px];
            let mut edges = EdgeFlags::empty();

            let neighbors = [
                (EdgeFlags::LEFT, px.checked_sub(1).map(|x| (x, pz))),
                (EdgeFlags::RIGHT, (px + 1 < num_x).then_some((px + 1, pz))),
                (EdgeFlags::BOTTOM, pz.checked_sub(1).map(|z| (px, z))),
                (EdgeFlags::TOP, (pz + 1 < num_z).then_some((px, pz + 1))),
            ];

            for (side, neighbor) in neighbors {
                let Some((nx, nz)) = neighbor else {
                    continue;
                };
                let neighbor_core = cores[nz * num_x + nx];
                if neighbor_core > core {
                    edges |= side;
                    if neighbor_core > core + 1 {
                        clamped_edges += 1;
                    }
                }
            }

            patches.push(PatchLod { core, edges });
        }

        if clamped_edges > 0 {
            log::warn!(
                "{} patch edges border a neighbor more than one LOD coarser; stitched as one level",
                clamped_edges
            );
        }

        LodMap {
            num_patches_x: num_x,
            num_patches_z: num_z,
            max_lod: self.layout.max_lod(),
            patches,
            clamped_edges,
        }
    }
}

/// Lowers LODs until every patch is at most one level coarser than its finest
/// neighbor.
fn limit_gaps(cores: &mut [u32], num_x: usize, num_z: usize) {
    loop {
        let mut changed = false;

        for pz in 0..num_z {
            for px in 0..num_x {
                let mut finest = u32::MAX;
                if px > 0 {
                    finest = finest.min(cores[pz * num_x + px - 1]);
                }
                if px + 1 < num_x {
                    finest = finest.min(cores[pz * num_x + px + 1]);
                }
                if pz > 0 {
                    finest = finest.min(cores[(pz - 1) * num_x + px]);
                }
                if pz + 1 < num_z {
                    finest = finest.min(cores[(pz + 1) * num_x + px]);
                }

                let cell = &mut cores[pz * num_x + px];
                if finest != u32::MAX && *cell > finest + 1 {
                    *cell = finest + 1;
                    changed = true;
                }
            }
        }

        if !changed {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use approx::assert_relative_eq;

    use super::*;
    use crate::terrain::index_library::{IndexBufferLibrary, Winding};

    fn layout(patches_x: usize, patches_z: usize) -> PatchLayout {
        PatchLayout::new(patches_x * 16 + 1, patches_z * 16 + 1, 17, 1.0).unwrap()
    }

    fn thresholds(values: &[f32], limit: bool) -> LodConfig {
        LodConfig {
            z_far: 0.0,
            thresholds: Some(values.to_vec()),
            limit_neighbor_gap: limit,
        }
    }

    #[test]
    fn derived_regions_grow_linearly() {
        let regions = LodConfig::default().regions(4).unwrap();
        let unit = 5000.0 / 15.0;

        assert_eq!(regions.len(), 5);
        assert_relative_eq!(regions[0], unit, epsilon = 1e-2);
        assert_relative_eq!(regions[1], 3.0 * unit, epsilon = 1e-2);
        assert_relative_eq!(regions[4], 5000.0, epsilon = 1e-2);
    }

    #[test]
    fn invalid_thresholds_are_rejected() {
        for bad in [vec![], vec![10.0, 5.0], vec![1.0, 1.0], vec![1.0, f32::NAN]] {
            assert!(matches!(
                thresholds(&bad, true).validate(),
                Err(TerrainError::InvalidLodThresholds)
            ));
        }
        assert!(thresholds(&[1.0, 2.0], true).validate().is_ok());
    }

    #[test]
    fn camera_at_patch_center_is_finest() {
        let layout = layout(4, 4);
        let selector = LodSelector::new(&layout, &LodConfig::default()).unwrap();
        let (cx, cz) = layout.patch_center(2, 1);

        let map = selector.select(Point3::new(cx, 100.0, cz));
        assert_eq!(map.get(2, 1).core, 0);
    }

    #[test]
    fn camera_beyond_last_region_is_coarsest() {
        let layout = layout(2, 2);
        let config = LodConfig {
            z_far: 100.0,
            ..Default::default()
        };
        let selector = LodSelector::new(&layout, &config).unwrap();

        let map = selector.select(Point3::new(10_000.0, 0.0, 10_000.0));
        assert!(map.patches().iter().all(|p| p.core == 4));
        assert_eq!(map.lod_histogram(), vec![0, 0, 0, 0, 4]);
    }

    #[test]
    fn non_finite_camera_is_coarsest() {
        let layout = layout(3, 3);
        let selector = LodSelector::new(&layout, &LodConfig::default()).unwrap();

        for camera in [
            Point3::new(f32::NAN, 0.0, 0.0),
            Point3::new(f32::INFINITY, 0.0, f32::NEG_INFINITY),
        ] {
            let map = selector.select(camera);
            assert!(map.patches().iter().all(|p| p.core == 4 && p.edges.is_empty()));
        }
    }

    #[test]
    fn large_gap_is_clamped_without_limiting() {
        let layout = layout(3, 1);
        let selector =
            LodSelector::new(&layout, &thresholds(&[5.0, 10.0, 20.0, 40.0, 80.0], false)).unwrap();

        let map = selector.select(Point3::new(8.0, 0.0, 8.0));
        let cores: Vec<u32> = map.patches().iter().map(|p| p.core).collect();

        assert_eq!(cores, vec![0, 2, 3]);
        assert_eq!(map.get(0, 0).edges, EdgeFlags::RIGHT);
        assert_eq!(map.get(1, 0).edges, EdgeFlags::RIGHT);
        assert_eq!(map.get(2, 0).edges, EdgeFlags::empty());
        assert_eq!(map.clamped_edges(), 1);
    }

    #[test]
    fn gap_limiting_keeps_neighbors_within_one_level() {
        let layout = layout(3, 1);
        let selector =
            LodSelector::new(&layout, &thresholds(&[5.0, 10.0, 20.0, 40.0, 80.0], true)).unwrap();

        let map = selector.select(Point3::new(8.0, 0.0, 8.0));
        let cores: Vec<u32> = map.patches().iter().map(|p| p.core).collect();

        assert_eq!(cores, vec![0, 1, 2]);
        assert_eq!(map.clamped_edges(), 0);
    }

    #[test]
    fn edge_flags_match_neighbor_lods() {
        let layout = layout(8, 6);
        let config = LodConfig {
            z_far: 200.0,
            ..Default::default()
        };
        let selector = LodSelector::new(&layout, &config).unwrap();

        for camera in [
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(37.5, 0.0, 61.0),
            Point3::new(127.9, 0.0, 95.0),
            Point3::new(300.0, 0.0, -40.0),
        ] {
            let map = selector.select(camera);
            assert_eq!(map.clamped_edges(), 0);

            for (px, pz) in layout.patch_coords() {
                let lod = map.get(px, pz);
                let coarser = |x: usize, z: usize| map.get(x, z).core > lod.core;

                assert_eq!(lod.edges.contains(EdgeFlags::LEFT), px > 0 && coarser(px - 1, pz));
                assert_eq!(lod.edges.contains(EdgeFlags::RIGHT), px + 1 < 8 && coarser(px + 1, pz));
                assert_eq!(lod.edges.contains(EdgeFlags::BOTTOM), pz > 0 && coarser(px, pz - 1));
                assert_eq!(lod.edges.contains(EdgeFlags::TOP), pz + 1 < 6 && coarser(px, pz + 1));

                for (nx, nz) in [(px + 1, pz), (px, pz + 1)] {
                    if nx < 8 && nz < 6 {
                        assert!(lod.core.abs_diff(map.get(nx, nz).core) <= 1);
                    }
                }
            }
        }
    }

    #[test]
    fn selected_neighbors_share_seam_vertices() {
        for patch_size in [3, 5, 9, 17] {
            let side = 8 * (patch_size - 1) + 1;
            let layout = PatchLayout::new(side, side, patch_size, 1.0).unwrap();
            let library = IndexBufferLibrary::build(&layout, Winding::CounterClockwise);
            let config = LodConfig {
                z_far: side as f32,
                ..Default::default()
            };
            let map = LodSelector::new(&layout, &config)
                .unwrap()
                .select(Point3::new(0.0, 0.0, 0.0));

            let used_lods = map.lod_histogram().iter().filter(|&&n| n > 0).count();
            assert!(used_lods > 1, "patch size {patch_size} selected a single LOD");

            // Grid coordinates of a patch's drawn vertices that lie on one grid line.
            let on_line = |px: usize, pz: usize, pick: &dyn Fn(usize, usize) -> Option<usize>| {
                let base = layout.base_vertex_offset(px, pz) as usize;
                library
                    .variant_indices(map.get(px, pz).key())
                    .iter()
                    .filter_map(|&i| {
                        let global = base + i as usize;
                        pick(global % side, global / side)
                    })
                    .collect::<BTreeSet<usize>>()
            };

            let mut seams = 0;
            for (px, pz) in layout.patch_coords() {
                if px + 1 < layout.num_patches_x() {
                    let x = (px + 1) * (patch_size - 1);
                    let pick = |gx: usize, gz: usize| (gx == x).then_some(gz);
                    assert_eq!(
                        on_line(px, pz, &pick),
                        on_line(px + 1, pz, &pick),
                        "size {patch_size}: seam between ({px}, {pz}) and ({}, {pz})",
                        px + 1
                    );
                    seams += 1;
                }
                if pz + 1 < layout.num_patches_z() {
                    let z = (pz + 1) * (patch_size - 1);
                    let pick = |gx: usize, gz: usize| (gz == z).then_some(gx);
                    assert_eq!(
                        on_line(px, pz, &pick),
                        on_line(px, pz + 1, &pick),
                        "size {patch_size}: seam between ({px}, {pz}) and ({px}, {})",
                        pz + 1
                    );
                    seams += 1;
                }
            }
            assert_eq!(seams, 2 * 8 * 7);
        }
    }

    #[test]
    fn selection_is_pure() {
        let layout = layout(5, 5);
        let selector = LodSelector::new(&layout, &LodConfig::default()).unwrap();
        let camera = Point3::new(12.0, 4.0, 70.0);

        assert_eq!(selector.select(camera), selector.select(camera));
    }
}
