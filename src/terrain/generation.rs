//! # Height Field Generation
//!
//! Procedural producers of [`HeightMap`]s:
//! - [`MidpointDisplacement`]: the diamond-square fractal algorithm
//! - [`PerlinTerrain`]: fractal Brownian motion over Perlin noise
//!
//! Both normalize their output into a configured height range, and both are
//! deterministic for a given seed.

use noise::{Fbm, MultiFractal, NoiseFn, Perlin};

use crate::{
    config::GeneratorConfig,
    error::{TerrainError, TerrainResult},
    terrain::height_source::{HeightMap, HeightSource},
};

/// Diamond-square terrain generator.
///
/// Every iteration halves the working rectangle and scales the random
/// displacement by `2^-roughness`, so higher roughness gives smoother terrain.
#[derive(Debug, Clone, Copy)]
pub struct MidpointDisplacement {
    pub roughness: f32,
    pub min_height: f32,
    pub max_height: f32,
    pub seed: u64,
}

impl MidpointDisplacement {
    /// Generates a `size x size` height map.
    ///
    /// # Arguments
    /// * `size` - Vertices per side, at least 2
    /// * `world_scale` - World units per grid step of the resulting map
    /// * `texture_scale` - Texture repeat factor of the resulting map
    ///
    /// # Returns
    /// The normalized map, or an error for invalid roughness or height range
    pub fn generate(
        &self,
        size: usize,
        world_scale: f32,
        texture_scale: f32,
    ) -> TerrainResult<HeightMap> {
        if !self.roughness.is_finite() || self.roughness < 0.0 {
            return Err(TerrainError::InvalidRoughness(self.roughness));
        }
        validate_range(self.min_height, self.max_height)?;
        if size < 2 {
            return Err(TerrainError::HeightMapNotSquare(size * size));
        }

        let mut map = HeightMap::flat(size, 0.0, world_scale, texture_scale);
        let mut rng = fastrand::Rng::with_seed(self.seed);

        let mut rect_size = size.next_power_of_two();
        let mut cur_height = rect_size as f32 / 2.0;
        let height_reduce = 2.0f32.powf(-self.roughness);

        while rect_size > 1 {
            diamond_step(&mut map, &mut rng, rect_size, cur_height);
            square_step(&mut map, &mut rng, rect_size, cur_height);

            rect_size /= 2;
            cur_height *= height_reduce;
        }

        map.normalize(self.min_height, self.max_height);
        log::info!(
            "Generated {}x{} midpoint displacement terrain (roughness {}, seed {})",
            size,
            size,
            self.roughness,
            self.seed
        );
        Ok(map)
    }
}

/// Wrapped "next corner" coordinate, pinned to the last vertex when it wraps.
fn next_coord(coord: usize, rect_size: usize, size: usize) -> usize {
    let next = (coord + rect_size) % size;
    if next < coord {
        size - 1
    } else {
        next
    }
}

fn displacement(rng: &mut fastrand::Rng, cur_height: f32) -> f32 {
    rng.f32() * 2.0 * cur_height - cur_height
}

/// Sets each rectangle's center to the average of its four corners plus noise.
fn diamond_step(map: &mut HeightMap, rng: &mut fastrand::Rng, rect_size: usize, cur_height: f32) {
    let size = map.size();
    let half = rect_size / 2;

    for z in (0..size).step_by(rect_size) {
        for x in (0..size).step_by(rect_size) {
            let next_x = next_coord(x, rect_size, size);
            let next_z = next_coord(z, rect_size, size);

            let corners = map.height(x, z)
                + map.height(next_x, z)
                + map.height(x, next_z)
                + map.height(next_x, next_z);

            let mid_x = (x + half) % size;
            let mid_z = (z + half) % size;
            let value = corners / 4.0 + displacement(rng, cur_height);
            map.set_height(mid_x, mid_z, value);
        }
    }
}

/// Sets each rectangle's top and left edge midpoints from the surrounding diamond.
fn square_step(map: &mut HeightMap, rng: &mut fastrand::Rng, rect_size: usize, cur_height: f32) {
    let size = map.size();
    let half = rect_size / 2;

    for z in (0..size).step_by(rect_size) {
        for x in (0..size).step_by(rect_size) {
            let next_x = next_coord(x, rect_size, size);
            let next_z = next_coord(z, rect_size, size);

            let mid_x = (x + half) % size;
            let mid_z = (z + half) % size;
            let prev_mid_x = (x + size - half) % size;
            let prev_mid_z = (z + size - half) % size;

            let top_left = map.height(x, z);
            let top_right = map.height(next_x, z);
            let bottom_left = map.height(x, next_z);
            let center = map.height(mid_x, mid_z);
            let prev_x_center = map.height(prev_mid_x, mid_z);
            let prev_z_center = map.height(mid_x, prev_mid_z);

            let left_mid = (top_left + center + bottom_left + prev_x_center) / 4.0
                + displacement(rng, cur_height);
            let top_mid = (top_left + center + top_right + prev_z_center) / 4.0
                + displacement(rng, cur_height);

            map.set_height(mid_x, z, top_mid);
            map.set_height(x, mid_z, left_mid);
        }
    }
}

/// Fractal Perlin noise terrain generator.
#[derive(Debug, Clone, Copy)]
pub struct PerlinTerrain {
    pub frequency: f64,
    pub octaves: usize,
    pub min_height: f32,
    pub max_height: f32,
    pub seed: u32,
}

impl PerlinTerrain {
    /// Generates a `size x size` height map by sampling the noise at grid coordinates.
    pub fn generate(
        &self,
        size: usize,
        world_scale: f32,
        texture_scale: f32,
    ) -> TerrainResult<HeightMap> {
        validate_range(self.min_height, self.max_height)?;
        if size < 2 {
            return Err(TerrainError::HeightMapNotSquare(size * size));
        }

        let fbm = Fbm::<Perlin>::new(self.seed)
            .set_frequency(self.frequency)
            .set_octaves(self.octaves.max(1));

        let mut map = HeightMap::from_fn(size, world_scale, texture_scale, |x, z| {
            fbm.get([x as f64, z as f64]) as f32
        });
        map.normalize(self.min_height, self.max_height);

        log::info!(
            "Generated {}x{} Perlin terrain ({} octaves, seed {})",
            size,
            size,
            self.octaves,
            self.seed
        );
        Ok(map)
    }
}

fn validate_range(min: f32, max: f32) -> TerrainResult<()> {
    if !min.is_finite() || !max.is_finite() || min >= max {
        return Err(TerrainError::InvalidHeightRange { min, max });
    }
    Ok(())
}

/// Produces the height map described by a generator configuration.
pub fn generate_height_map(
    generator: &GeneratorConfig,
    size: usize,
    world_scale: f32,
    texture_scale: f32,
) -> TerrainResult<HeightMap> {
    match generator {
        GeneratorConfig::MidpointDisplacement {
            roughness,
            min_height,
            max_height,
            seed,
        } => MidpointDisplacement {
            roughness: *roughness,
            min_height: *min_height,
            max_height: *max_height,
            seed: *seed,
        }
        .generate(size, world_scale, texture_scale),
        GeneratorConfig::Perlin {
            frequency,
            octaves,
            min_height,
            max_height,
            seed,
        } => PerlinTerrain {
            frequency: *frequency,
            octaves: *octaves,
            min_height: *min_height,
            max_height: *max_height,
            seed: *seed,
        }
        .generate(size, world_scale, texture_scale),
        GeneratorConfig::HeightMapFile { path } => {
            HeightMap::from_raw_f32_file(path, world_scale, texture_scale)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn midpoint(seed: u64) -> MidpointDisplacement {
        MidpointDisplacement {
            roughness: 1.0,
            min_height: 0.0,
            max_height: 300.0,
            seed,
        }
    }

    #[test]
    fn midpoint_output_spans_requested_range() {
        let map = midpoint(3).generate(33, 1.0, 1.0).unwrap();
        let (min, max) = map.min_max_height();

        assert_eq!(map.size(), 33);
        assert!((min - 0.0).abs() < 1e-3);
        assert!((max - 300.0).abs() < 1e-3);
        assert!(map.heights().iter().all(|h| h.is_finite()));
    }

    #[test]
    fn midpoint_is_deterministic_per_seed() {
        let a = midpoint(11).generate(17, 1.0, 1.0).unwrap();
        let b = midpoint(11).generate(17, 1.0, 1.0).unwrap();
        let c = midpoint(12).generate(17, 1.0, 1.0).unwrap();

        assert_eq!(a.heights(), b.heights());
        assert_ne!(a.heights(), c.heights());
    }

    #[test]
    fn midpoint_rejects_negative_roughness() {
        let generator = MidpointDisplacement {
            roughness: -1.0,
            ..midpoint(0)
        };
        assert!(matches!(
            generator.generate(17, 1.0, 1.0),
            Err(TerrainError::InvalidRoughness(_))
        ));
    }

    #[test]
    fn perlin_output_spans_requested_range() {
        let generator = PerlinTerrain {
            frequency: 0.05,
            octaves: 4,
            min_height: 10.0,
            max_height: 90.0,
            seed: 5,
        };
        let map = generator.generate(65, 1.0, 1.0).unwrap();
        let (min, max) = map.min_max_height();

        assert!((min - 10.0).abs() < 1e-3);
        assert!((max - 90.0).abs() < 1e-3);
    }

    #[test]
    fn config_dispatch_uses_requested_generator() {
        let map = generate_height_map(&GeneratorConfig::default(), 17, 2.0, 4.0).unwrap();

        assert_eq!(map.size(), 17);
        assert_eq!(map.world_scale(), 2.0);
        assert_eq!(map.texture_scale(), 4.0);
    }
}
