//! Debug Draw Data
//!
//! Backend-free visualization: the world writes line segments, outlined
//! shapes, and markers into growable buffers, and any renderer consumes
//! them. No drawing happens in this crate.

use crate::math::Vec2;

#[cfg(not(feature = "std"))]
use alloc::vec::Vec;

/// RGBA color, 0..=1 channels
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DebugColor {
    /// Red
    pub r: f32,
    /// Green
    pub g: f32,
    /// Blue
    pub b: f32,
    /// Alpha
    pub a: f32,
}

impl DebugColor {
    /// Opaque color from RGB
    pub const fn rgb(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b, a: 1.0 }
    }

    /// Awake dynamic bodies
    pub const AWAKE: Self = Self::rgb(0.9, 0.7, 0.7);
    /// Sleeping bodies
    pub const ASLEEP: Self = Self::rgb(0.5, 0.5, 0.7);
    /// Static bodies
    pub const STATIC: Self = Self::rgb(0.5, 0.9, 0.5);
    /// Kinematic bodies
    pub const KINEMATIC: Self = Self::rgb(0.5, 0.5, 0.9);
    /// Broad-phase AABBs
    pub const AABB: Self = Self::rgb(0.9, 0.3, 0.9);
    /// Contact points
    pub const CONTACT: Self = Self::rgb(0.9, 0.9, 0.3);
    /// Joints
    pub const JOINT: Self = Self::rgb(0.5, 0.8, 0.8);
}

/// What to emit into the buffers
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DebugDrawFlags {
    /// Shape outlines
    pub shapes: bool,
    /// Joint anchor segments
    pub joints: bool,
    /// Fat AABBs from the broad phase
    pub aabbs: bool,
    /// Contact points and normals
    pub contacts: bool,
    /// Body transforms (two axis ticks per body)
    pub transforms: bool,
}

impl Default for DebugDrawFlags {
    fn default() -> Self {
        Self {
            shapes: true,
            joints: true,
            aabbs: false,
            contacts: false,
            transforms: false,
        }
    }
}

/// A colored line segment
#[derive(Clone, Copy, Debug)]
pub struct DebugSegment {
    /// Start point
    pub p1: Vec2,
    /// End point
    pub p2: Vec2,
    /// Color
    pub color: DebugColor,
}

/// A colored circle outline
#[derive(Clone, Copy, Debug)]
pub struct DebugCircle {
    /// Center
    pub center: Vec2,
    /// Radius
    pub radius: f32,
    /// Color
    pub color: DebugColor,
}

/// A colored marker point
#[derive(Clone, Copy, Debug)]
pub struct DebugPoint {
    /// Position
    pub position: Vec2,
    /// Suggested size in pixels
    pub size: f32,
    /// Color
    pub color: DebugColor,
}

/// Growable buffers a renderer drains after `World::debug_draw`
#[derive(Debug, Default)]
pub struct DebugDrawData {
    /// Line segments (polygon edges, joints, normals)
    pub segments: Vec<DebugSegment>,
    /// Circles
    pub circles: Vec<DebugCircle>,
    /// Point markers (contacts)
    pub points: Vec<DebugPoint>,
}

impl DebugDrawData {
    /// Empty buffers
    pub fn new() -> Self {
        Self::default()
    }

    /// Clear all buffers, keeping capacity
    pub fn clear(&mut self) {
        self.segments.clear();
        self.circles.clear();
        self.points.clear();
    }

    /// Push one segment
    #[inline]
    pub fn segment(&mut self, p1: Vec2, p2: Vec2, color: DebugColor) {
        self.segments.push(DebugSegment { p1, p2, color });
    }

    /// Push a closed polygon outline
    pub fn polygon(&mut self, vertices: &[Vec2], color: DebugColor) {
        for i in 0..vertices.len() {
            let j = if i + 1 < vertices.len() { i + 1 } else { 0 };
            self.segment(vertices[i], vertices[j], color);
        }
    }

    /// Push a circle outline
    #[inline]
    pub fn circle(&mut self, center: Vec2, radius: f32, color: DebugColor) {
        self.circles.push(DebugCircle {
            center,
            radius,
            color,
        });
    }

    /// Push a point marker
    #[inline]
    pub fn point(&mut self, position: Vec2, size: f32, color: DebugColor) {
        self.points.push(DebugPoint {
            position,
            size,
            color,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_polygon_closes_loop() {
        let mut data = DebugDrawData::new();
        let verts = [
            Vec2::new(0.0, 0.0),
            Vec2::new(1.0, 0.0),
            Vec2::new(1.0, 1.0),
        ];
        data.polygon(&verts, DebugColor::STATIC);
        assert_eq!(data.segments.len(), 3);
        // Last segment returns to the first vertex
        assert_eq!(data.segments[2].p2, verts[0]);
    }

    #[test]
    fn test_clear_keeps_capacity() {
        let mut data = DebugDrawData::new();
        data.circle(Vec2::ZERO, 1.0, DebugColor::AWAKE);
        data.point(Vec2::ZERO, 4.0, DebugColor::CONTACT);
        let cap = data.circles.capacity();
        data.clear();
        assert!(data.circles.is_empty());
        assert_eq!(data.circles.capacity(), cap);
    }
}
