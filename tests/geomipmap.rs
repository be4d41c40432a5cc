//! End-to-end checks of the terrain core through its public API.

use cgmath::{Deg, Point3};
use geomip_terrain::{
    config::{GeneratorConfig, TerrainConfig},
    engine_state::camera_state::{
        camera::{Camera, Projection},
        CameraSnapshot,
    },
    terrain::{
        draw::RecordingBackend, submit, CompiledTerrain, CullingStrategy, EdgeFlags, HeightMap,
        HeightSource, IndexBufferLibrary, LodConfig, LodKey, PatchLayout, Winding,
    },
};

fn generated(size: usize, patch_size: usize) -> CompiledTerrain {
    let config = TerrainConfig {
        terrain_size: size,
        patch_size,
        world_scale: 1.0,
        generator: GeneratorConfig::MidpointDisplacement {
            roughness: 1.0,
            min_height: 0.0,
            max_height: 40.0,
            seed: 17,
        },
        ..Default::default()
    };
    CompiledTerrain::generate(&config).unwrap().1
}

fn looking_down_on(center: f32, height: f32) -> CameraSnapshot {
    let camera = Camera::new(Point3::new(center, height, center), Deg(0.0), Deg(-90.0));
    let projection = Projection::new(800, 800, Deg(90.0), 1.0, 5000.0);
    CameraSnapshot::new(&camera, &projection)
}

#[test]
fn single_patch_of_seventeen() {
    let layout = PatchLayout::new(17, 17, 17, 1.0).unwrap();
    assert_eq!(layout.max_lod(), 4);
    assert_eq!(layout.patch_count(), 1);

    let library = IndexBufferLibrary::build(&layout, Winding::CounterClockwise);
    assert_eq!(library.variant_count(), 80);

    let mut slices: Vec<_> = library.variants().map(|(_, slice)| slice).collect();
    slices.sort_by_key(|s| s.start);
    let mut cursor = 0;
    for slice in &slices {
        assert_eq!(slice.start, cursor, "slices must be contiguous");
        assert!(slice.count > 0 && slice.count % 3 == 0);
        cursor += slice.count;
    }
    assert_eq!(cursor as usize, library.total_indices());
    assert!(library.indices().iter().all(|&i| i < 17 * 17));
}

#[test]
fn patch_counts_cover_the_grid() {
    for patch_size in [3, 5, 9, 17, 33] {
        for patches_x in 1..=4 {
            for patches_z in 1..=3 {
                let width = patches_x * (patch_size - 1) + 1;
                let depth = patches_z * (patch_size - 1) + 1;
                let layout = PatchLayout::new(width, depth, patch_size, 1.0).unwrap();

                assert_eq!(layout.num_patches_x() * (patch_size - 1), width - 1);
                assert_eq!(layout.num_patches_z() * (patch_size - 1), depth - 1);
            }
        }
    }
}

#[test]
fn bad_layouts_are_rejected() {
    assert!(PatchLayout::new(65, 65, 16, 1.0).is_err());
    assert!(PatchLayout::new(60, 65, 17, 1.0).is_err());
    assert!(PatchLayout::new(9, 9, 17, 1.0).is_err());
    assert!(PatchLayout::new(65, 65, 17, 0.0).is_err());
}

#[test]
fn every_index_stays_inside_its_patch() {
    let terrain = generated(65, 9);
    let layout = terrain.layout();
    let width = layout.width() as u32;
    let last = layout.patch_size() as u32 - 1;

    for (key, _) in terrain.library().variants() {
        for &index in terrain.library().variant_indices(key) {
            assert!(index % width <= last && index / width <= last, "{key:?} index {index}");
        }
    }
}

#[test]
fn camera_position_drives_lod() {
    let terrain = generated(129, 17);
    let max_lod = terrain.layout().max_lod();

    let (cx, cz) = terrain.layout().patch_center(3, 5);
    let near = terrain.select_lod(Point3::new(cx, 50.0, cz));
    assert_eq!(near.get(3, 5).core, 0);

    let far = terrain.select_lod(Point3::new(1.0e6, 0.0, 1.0e6));
    assert!(far.patches().iter().all(|p| p.core == max_lod));
    assert!(far.patches().iter().all(|p| p.edges.is_empty()));
}

#[test]
fn neighbors_differ_by_at_most_one_and_flags_match() {
    let layout = PatchLayout::new(257, 257, 17, 1.0).unwrap();
    let map = HeightMap::flat(257, 0.0, 1.0, 1.0);
    let lod = LodConfig {
        thresholds: Some(vec![20.0, 40.0, 80.0, 120.0, 160.0]),
        ..Default::default()
    };
    let terrain =
        CompiledTerrain::compile(layout, &map, 1.0, &lod, Winding::CounterClockwise).unwrap();
    let lod_map = terrain.select_lod(Point3::new(10.0, 5.0, 10.0));
    assert_eq!(lod_map.clamped_edges(), 0);

    let (nx, nz) = (layout.num_patches_x(), layout.num_patches_z());
    for (px, pz) in layout.patch_coords() {
        let here = lod_map.get(px, pz);
        let sides = [
            (EdgeFlags::LEFT, px.checked_sub(1).map(|x| (x, pz))),
            (EdgeFlags::RIGHT, (px + 1 < nx).then_some((px + 1, pz))),
            (EdgeFlags::BOTTOM, pz.checked_sub(1).map(|z| (px, z))),
            (EdgeFlags::TOP, (pz + 1 < nz).then_some((px, pz + 1))),
        ];
        for (side, neighbor) in sides {
            match neighbor {
                Some((x, z)) => {
                    let there = lod_map.get(x, z);
                    assert!(here.core.abs_diff(there.core) <= 1);
                    assert_eq!(here.edges.contains(side), there.core > here.core);
                }
                None => assert!(!here.edges.contains(side)),
            }
        }
    }
}

#[test]
fn frame_submits_one_draw_per_visible_patch() {
    let terrain = generated(129, 17);
    let snapshot = looking_down_on(64.0, 200.0);
    let vertex_count = terrain.vertices().len() as i64;

    for strategy in [CullingStrategy::ViewSpace, CullingStrategy::WorldSpace] {
        let list = terrain.frame_draw_list(snapshot.position, snapshot.view_proj, strategy);
        assert_eq!(list.stats.visible_patches, terrain.layout().patch_count());

        let mut backend = RecordingBackend::default();
        submit(&list, &mut backend);
        assert_eq!(backend.calls.len(), list.stats.draw_calls);

        for (indices, base_vertex) in &backend.calls {
            let highest = terrain.indices()[indices.start as usize..indices.end as usize]
                .iter()
                .max()
                .copied()
                .unwrap();
            assert!(*base_vertex as i64 + (highest as i64) < vertex_count);
        }
    }
}

#[test]
fn patches_behind_the_camera_are_culled_by_both_strategies() {
    let terrain = generated(129, 17);
    // Standing at the -X edge, looking away from the terrain.
    let camera = Camera::new(Point3::new(-10.0, 20.0, 64.0), Deg(180.0), Deg(0.0));
    let projection = Projection::new(800, 600, Deg(60.0), 1.0, 5000.0);
    let snapshot = CameraSnapshot::new(&camera, &projection);

    for strategy in [CullingStrategy::ViewSpace, CullingStrategy::WorldSpace] {
        let list = terrain.frame_draw_list(snapshot.position, snapshot.view_proj, strategy);
        assert_eq!(list.stats.visible_patches, 0, "{strategy:?}");
        assert_eq!(list.stats.culled_patches, terrain.layout().patch_count());
    }
}

#[test]
fn coarsest_level_is_a_single_quad() {
    let layout = PatchLayout::new(33, 33, 33, 1.0).unwrap();
    let library = IndexBufferLibrary::build(&layout, Winding::CounterClockwise);
    let coarsest = library.variant_indices(LodKey::new(layout.max_lod(), EdgeFlags::empty()));
    assert_eq!(coarsest.len(), 6);
}

#[test]
fn json_config_drives_generation() {
    let json = r#"{
        "terrain_size": 65,
        "patch_size": 9,
        "world_scale": 2.0,
        "generator": { "kind": "Perlin", "frequency": 0.05, "octaves": 4,
                       "min_height": 10.0, "max_height": 90.0, "seed": 5 },
        "culling": "ViewSpace"
    }"#;
    let config: TerrainConfig = serde_json::from_str(json).unwrap();
    config.validate().unwrap();
    assert_eq!(config.culling, CullingStrategy::ViewSpace);

    let (map, terrain) = CompiledTerrain::generate(&config).unwrap();
    assert_eq!(map.size(), 65);
    assert_eq!(terrain.layout().patch_count(), 64);
    let (lo, hi) = terrain.grid().height_range();
    assert!(lo >= 10.0 - 1e-3 && hi <= 90.0 + 1e-3);
}
