//! Rays for pointer picking.

use glam::{Mat3, Mat4, Vec3};

use crate::resources::Aabb;

/// Hits closer than this are pulled back toward the ray origin so cursors
/// drawn at the hit point do not z-fight with the surface.
const HIT_OFFSET: f32 = 0.02;

/// A ray with precomputed reciprocal direction for slab tests.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ray {
    origin: Vec3,
    direction: Vec3,
    inv_direction: Vec3,
    /// 1 where the direction component is negative.
    sign: [usize; 3],
}

impl Default for Ray {
    /// From the origin, looking down -Z.
    fn default() -> Self {
        Self::new(Vec3::ZERO, Vec3::NEG_Z)
    }
}

impl Ray {
    #[must_use]
    pub fn new(origin: Vec3, direction: Vec3) -> Self {
        let mut ray = Self {
            origin,
            direction: Vec3::NEG_Z,
            inv_direction: Vec3::ZERO,
            sign: [0; 3],
        };
        ray.set_direction(direction);
        ray
    }

    /// The default ray moved by `transform`: origin is the transformed
    /// origin, direction is -Z rotated by the transform's upper 3x3.
    #[must_use]
    pub fn from_transform(transform: &Mat4) -> Self {
        let origin = transform.transform_point3(Vec3::ZERO);
        let direction = Mat3::from_mat4(*transform) * Vec3::NEG_Z;
        Self::new(origin, direction)
    }

    #[inline]
    #[must_use]
    pub fn origin(&self) -> Vec3 {
        self.origin
    }

    #[inline]
    #[must_use]
    pub fn direction(&self) -> Vec3 {
        self.direction
    }

    pub fn set_origin(&mut self, origin: Vec3) {
        self.origin = origin;
    }

    /// Normalizes `direction` and refreshes the cached reciprocal and signs.
    pub fn set_direction(&mut self, direction: Vec3) {
        self.direction = direction.normalize_or(Vec3::NEG_Z);
        self.inv_direction = Vec3::ONE / self.direction;
        self.sign = [
            usize::from(self.inv_direction.x < 0.0),
            usize::from(self.inv_direction.y < 0.0),
            usize::from(self.inv_direction.z < 0.0),
        ];
    }

    /// Point `distance` units along the ray.
    #[must_use]
    pub fn at(&self, distance: f32) -> Vec3 {
        self.origin + self.direction * distance
    }

    /// Slab test against an axis-aligned box.
    ///
    /// Returns the nearest intersection in front of the origin, pulled back
    /// slightly toward it, or `None` if the box is missed or lies behind.
    #[must_use]
    pub fn intersects_aabb(&self, aabb: &Aabb) -> Option<Vec3> {
        let bounds = [aabb.min, aabb.max];
        let slab = |axis: usize| -> (f32, f32) {
            let sign = self.sign[axis];
            (
                (bounds[sign][axis] - self.origin[axis]) * self.inv_direction[axis],
                (bounds[1 - sign][axis] - self.origin[axis]) * self.inv_direction[axis],
            )
        };

        let (mut tmin, mut tmax) = slab(0);
        let (tymin, tymax) = slab(1);
        if tmin > tymax || tymin > tmax {
            return None;
        }
        tmin = tmin.max(tymin);
        tmax = tmax.min(tymax);

        let (tzmin, tzmax) = slab(2);
        if tmin > tzmax || tzmin > tmax {
            return None;
        }
        tmin = tmin.max(tzmin);
        tmax = tmax.min(tzmax);

        let t = match (tmin > 0.0, tmax > 0.0) {
            (true, true) => tmin.min(tmax),
            (true, false) => tmin,
            (false, true) => tmax,
            (false, false) => return None,
        };

        Some(self.at(t - HIT_OFFSET))
    }
}
