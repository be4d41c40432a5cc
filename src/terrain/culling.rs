//! # Frustum Culling
//!
//! Two interchangeable patch visibility tests against a combined view-projection
//! matrix in wgpu clip conventions (`-w <= x, y <= w` and `0 <= z <= w`):
//!
//! - **View space**: transform the eight box corners to clip space and reject the
//!   box when all of them fall outside the same clip plane.
//! - **World space**: extract the six frustum planes from the matrix once per
//!   frame, then test each box by projecting its extents onto the plane normal.
//!
//! Both are conservative: a box is only rejected when it is strictly outside at
//! least one plane, so nothing on screen is ever culled.

use cgmath::{InnerSpace, Matrix, Matrix4, Vector3, Vector4};
use serde::{Deserialize, Serialize};

use crate::terrain::patch_grid::PatchBounds;

/// Which visibility test the culler runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CullingStrategy {
    ViewSpace,
    #[default]
    WorldSpace,
}

impl CullingStrategy {
    /// The other strategy.
    pub fn toggled(self) -> Self {
        match self {
            CullingStrategy::ViewSpace => CullingStrategy::WorldSpace,
            CullingStrategy::WorldSpace => CullingStrategy::ViewSpace,
        }
    }
}

/// Rejects a box whose corners all lie outside one clip plane.
pub fn is_visible_view_space(bounds: &PatchBounds, view_proj: &Matrix4<f32>) -> bool {
    let clip = bounds
        .corners()
        .map(|corner| *view_proj * corner.to_homogeneous());

    let outside: [fn(&Vector4<f32>) -> bool; 6] = [
        |c| c.x < -c.w,
        |c| c.x > c.w,
        |c| c.y < -c.w,
        |c| c.y > c.w,
        |c| c.z < 0.0,
        |c| c.z > c.w,
    ];

    !outside
        .iter()
        .any(|violates| clip.iter().all(|corner| violates(corner)))
}

/// A normalized plane, `normal . p + d = signed distance`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Plane {
    pub normal: Vector3<f32>,
    pub d: f32,
}

impl Plane {
    fn from_row(row: Vector4<f32>) -> Self {
        let normal = row.truncate();
        let length = normal.magnitude();
        if length > 0.0 {
            Plane {
                normal: normal / length,
                d: row.w / length,
            }
        } else {
            Plane { normal, d: row.w }
        }
    }
}

/// The six world-space planes of a view frustum, normals pointing inward.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Frustum {
    /// Left, right, bottom, top, near, far
    pub planes: [Plane; 6],
}

impl Frustum {
    pub fn from_view_proj(view_proj: &Matrix4<f32>) -> Self {
        let r0 = view_proj.row(0);
        let r1 = view_proj.row(1);
        let r2 = view_proj.row(2);
        let r3 = view_proj.row(3);

        Frustum {
            planes: [
                Plane::from_row(r3 + r0),
                Plane::from_row(r3 - r0),
                Plane::from_row(r3 + r1),
                Plane::from_row(r3 - r1),
                Plane::from_row(r2),
                Plane::from_row(r3 - r2),
            ],
        }
    }

    /// False only when the box lies entirely on the outer side of some plane.
    pub fn intersects_aabb(&self, bounds: &PatchBounds) -> bool {
        let center = bounds.center();
        let extents = bounds.extents();

        self.planes.iter().all(|plane| {
            let s = plane.normal.dot(Vector3::new(center.x, center.y, center.z)) + plane.d;
            let r = extents.x * plane.normal.x.abs()
                + extents.y * plane.normal.y.abs()
                + extents.z * plane.normal.z.abs();
            s + r >= 0.0
        })
    }
}

/// Per-frame visibility test, prepared for one view-projection matrix.
#[derive(Debug, Clone, Copy)]
pub enum FrustumCuller {
    ViewSpace(Matrix4<f32>),
    WorldSpace(Frustum),
}

impl FrustumCuller {
    pub fn new(strategy: CullingStrategy, view_proj: Matrix4<f32>) -> Self {
        match strategy {
            CullingStrategy::ViewSpace => FrustumCuller::ViewSpace(view_proj),
            CullingStrategy::WorldSpace => {
                FrustumCuller::WorldSpace(Frustum::from_view_proj(&view_proj))
            }
        }
    }

    pub fn is_visible(&self, bounds: &PatchBounds) -> bool {
        match self {
            FrustumCuller::ViewSpace(view_proj) => is_visible_view_space(bounds, view_proj),
            FrustumCuller::WorldSpace(frustum) => frustum.intersects_aabb(bounds),
        }
    }
}
