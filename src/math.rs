//! 2D Math Primitives
//!
//! Vectors, rotations, transforms, and sweeps for the 2D rigid-body pipeline.
//!
//! # Features
//!
//! - **Vec2/Rot/Transform**: the usual 2D rigid transform algebra
//! - **Sweep**: a transform parameterized over a timestep, used by TOI
//! - **Mat22/Mat33**: small dense blocks for effective-mass solves
//! - **no_std**: trig and square roots route through `libm` without `std`
//!
//! Rotations are stored as (sin, cos) pairs so composing and applying them
//! never re-evaluates trigonometry.
//!
//! Author: Moroya Sakamoto

use core::ops::{Add, AddAssign, Div, Mul, MulAssign, Neg, Sub, SubAssign};

// ============================================================================
// Scalar helpers
// ============================================================================

/// π as f32
pub const PI: f32 = core::f32::consts::PI;

/// Square root that works in `no_std` builds
#[inline(always)]
pub fn sqrt(x: f32) -> f32 {
    #[cfg(feature = "std")]
    {
        x.sqrt()
    }
    #[cfg(not(feature = "std"))]
    {
        libm::sqrtf(x)
    }
}

/// Sine that works in `no_std` builds
#[inline(always)]
pub fn sin(x: f32) -> f32 {
    #[cfg(feature = "std")]
    {
        x.sin()
    }
    #[cfg(not(feature = "std"))]
    {
        libm::sinf(x)
    }
}

/// Cosine that works in `no_std` builds
#[inline(always)]
pub fn cos(x: f32) -> f32 {
    #[cfg(feature = "std")]
    {
        x.cos()
    }
    #[cfg(not(feature = "std"))]
    {
        libm::cosf(x)
    }
}

/// Four-quadrant arctangent that works in `no_std` builds
#[inline(always)]
pub fn atan2(y: f32, x: f32) -> f32 {
    #[cfg(feature = "std")]
    {
        y.atan2(x)
    }
    #[cfg(not(feature = "std"))]
    {
        libm::atan2f(y, x)
    }
}

/// Floor that works in `no_std` builds
#[inline(always)]
pub fn floor(x: f32) -> f32 {
    #[cfg(feature = "std")]
    {
        x.floor()
    }
    #[cfg(not(feature = "std"))]
    {
        libm::floorf(x)
    }
}

/// Check that a scalar is finite (not NaN or infinity)
#[inline(always)]
pub fn is_valid(x: f32) -> bool {
    x.is_finite()
}

/// Clamp a scalar to [lo, hi]
#[inline(always)]
pub fn clamp(x: f32, lo: f32, hi: f32) -> f32 {
    if x < lo {
        lo
    } else if x > hi {
        hi
    } else {
        x
    }
}

// ============================================================================
// Vec2
// ============================================================================

/// A 2D column vector
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Vec2 {
    /// X component
    pub x: f32,
    /// Y component
    pub y: f32,
}

impl Vec2 {
    /// Zero vector
    pub const ZERO: Self = Self { x: 0.0, y: 0.0 };

    /// Unit vector along +X
    pub const UNIT_X: Self = Self { x: 1.0, y: 0.0 };

    /// Unit vector along +Y
    pub const UNIT_Y: Self = Self { x: 0.0, y: 1.0 };

    /// Create a new vector
    #[inline]
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Dot product
    #[inline]
    pub fn dot(self, rhs: Self) -> f32 {
        self.x * rhs.x + self.y * rhs.y
    }

    /// 2D cross product (z component of the 3D cross)
    #[inline]
    pub fn cross(self, rhs: Self) -> f32 {
        self.x * rhs.y - self.y * rhs.x
    }

    /// Cross a vector with a scalar: `v × s` — rotates `v` by −90° scaled by `s`
    #[inline]
    pub fn cross_scalar(self, s: f32) -> Self {
        Self::new(s * self.y, -s * self.x)
    }

    /// Cross a scalar with a vector: `s × v` — rotates `v` by +90° scaled by `s`
    #[inline]
    pub fn scalar_cross(s: f32, v: Self) -> Self {
        Self::new(-s * v.y, s * v.x)
    }

    /// Counter-clockwise perpendicular
    #[inline]
    pub fn skew(self) -> Self {
        Self::new(-self.y, self.x)
    }

    /// Squared length
    #[inline]
    pub fn length_squared(self) -> f32 {
        self.dot(self)
    }

    /// Length
    #[inline]
    pub fn length(self) -> f32 {
        sqrt(self.length_squared())
    }

    /// Normalize in place, returning the pre-normalization length.
    ///
    /// Vectors shorter than f32 epsilon are left unchanged and report 0 length.
    #[inline]
    pub fn normalize(&mut self) -> f32 {
        let len = self.length();
        if len < f32::EPSILON {
            return 0.0;
        }
        let inv = 1.0 / len;
        self.x *= inv;
        self.y *= inv;
        len
    }

    /// Normalized copy (zero vector stays zero)
    #[inline]
    pub fn normalized(self) -> Self {
        let mut v = self;
        v.normalize();
        v
    }

    /// Component-wise minimum
    #[inline]
    pub fn min(self, rhs: Self) -> Self {
        Self::new(self.x.min(rhs.x), self.y.min(rhs.y))
    }

    /// Component-wise maximum
    #[inline]
    pub fn max(self, rhs: Self) -> Self {
        Self::new(self.x.max(rhs.x), self.y.max(rhs.y))
    }

    /// Component-wise absolute value
    #[inline]
    pub fn abs(self) -> Self {
        Self::new(self.x.abs(), self.y.abs())
    }

    /// True if both components are finite
    #[inline]
    pub fn is_valid(self) -> bool {
        is_valid(self.x) && is_valid(self.y)
    }
}

impl Add for Vec2 {
    type Output = Self;
    #[inline]
    fn add(self, rhs: Self) -> Self {
        Self::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl AddAssign for Vec2 {
    #[inline]
    fn add_assign(&mut self, rhs: Self) {
        self.x += rhs.x;
        self.y += rhs.y;
    }
}

impl Sub for Vec2 {
    type Output = Self;
    #[inline]
    fn sub(self, rhs: Self) -> Self {
        Self::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl SubAssign for Vec2 {
    #[inline]
    fn sub_assign(&mut self, rhs: Self) {
        self.x -= rhs.x;
        self.y -= rhs.y;
    }
}

impl Mul<f32> for Vec2 {
    type Output = Self;
    #[inline]
    fn mul(self, rhs: f32) -> Self {
        Self::new(self.x * rhs, self.y * rhs)
    }
}

impl MulAssign<f32> for Vec2 {
    #[inline]
    fn mul_assign(&mut self, rhs: f32) {
        self.x *= rhs;
        self.y *= rhs;
    }
}

impl Mul<Vec2> for f32 {
    type Output = Vec2;
    #[inline]
    fn mul(self, rhs: Vec2) -> Vec2 {
        Vec2::new(self * rhs.x, self * rhs.y)
    }
}

impl Div<f32> for Vec2 {
    type Output = Self;
    #[inline]
    fn div(self, rhs: f32) -> Self {
        Self::new(self.x / rhs, self.y / rhs)
    }
}

impl Neg for Vec2 {
    type Output = Self;
    #[inline]
    fn neg(self) -> Self {
        Self::new(-self.x, -self.y)
    }
}

// ============================================================================
// Vec3 (joint block solves only)
// ============================================================================

/// A 3D column vector used by 3x3 joint blocks
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Vec3 {
    /// X component
    pub x: f32,
    /// Y component
    pub y: f32,
    /// Z component
    pub z: f32,
}

impl Vec3 {
    /// Zero vector
    pub const ZERO: Self = Self {
        x: 0.0,
        y: 0.0,
        z: 0.0,
    };

    /// Create a new vector
    #[inline]
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    /// Dot product
    #[inline]
    pub fn dot(self, rhs: Self) -> f32 {
        self.x * rhs.x + self.y * rhs.y + self.z * rhs.z
    }

    /// Cross product
    #[inline]
    pub fn cross(self, rhs: Self) -> Self {
        Self::new(
            self.y * rhs.z - self.z * rhs.y,
            self.z * rhs.x - self.x * rhs.z,
            self.x * rhs.y - self.y * rhs.x,
        )
    }
}

impl Add for Vec3 {
    type Output = Self;
    #[inline]
    fn add(self, rhs: Self) -> Self {
        Self::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl Sub for Vec3 {
    type Output = Self;
    #[inline]
    fn sub(self, rhs: Self) -> Self {
        Self::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl Mul<f32> for Vec3 {
    type Output = Self;
    #[inline]
    fn mul(self, rhs: f32) -> Self {
        Self::new(self.x * rhs, self.y * rhs, self.z * rhs)
    }
}

impl Neg for Vec3 {
    type Output = Self;
    #[inline]
    fn neg(self) -> Self {
        Self::new(-self.x, -self.y, -self.z)
    }
}

// ============================================================================
// Mat22
// ============================================================================

/// A 2x2 matrix stored as two column vectors
#[derive(Clone, Copy, Debug, Default)]
pub struct Mat22 {
    /// First column
    pub ex: Vec2,
    /// Second column
    pub ey: Vec2,
}

impl Mat22 {
    /// Identity matrix
    pub const IDENTITY: Self = Self {
        ex: Vec2 { x: 1.0, y: 0.0 },
        ey: Vec2 { x: 0.0, y: 1.0 },
    };

    /// Create from columns
    #[inline]
    pub const fn new(ex: Vec2, ey: Vec2) -> Self {
        Self { ex, ey }
    }

    /// Multiply by a vector
    #[inline]
    pub fn mul_vec(self, v: Vec2) -> Vec2 {
        Vec2::new(
            self.ex.x * v.x + self.ey.x * v.y,
            self.ex.y * v.x + self.ey.y * v.y,
        )
    }

    /// Solve `A * x = b` without forming the inverse.
    ///
    /// A singular matrix yields a zero solution.
    #[inline]
    pub fn solve(self, b: Vec2) -> Vec2 {
        let a11 = self.ex.x;
        let a12 = self.ey.x;
        let a21 = self.ex.y;
        let a22 = self.ey.y;
        let mut det = a11 * a22 - a12 * a21;
        if det != 0.0 {
            det = 1.0 / det;
        }
        Vec2::new(det * (a22 * b.x - a12 * b.y), det * (a11 * b.y - a21 * b.x))
    }

    /// Inverse (singular matrices produce a zero matrix)
    #[inline]
    pub fn inverse(self) -> Self {
        let a = self.ex.x;
        let b = self.ey.x;
        let c = self.ex.y;
        let d = self.ey.y;
        let mut det = a * d - b * c;
        if det != 0.0 {
            det = 1.0 / det;
        }
        Self {
            ex: Vec2::new(det * d, -det * c),
            ey: Vec2::new(-det * b, det * a),
        }
    }
}

// ============================================================================
// Mat33
// ============================================================================

/// A 3x3 matrix stored as three column vectors.
///
/// Only the operations the joint solver needs: a full 3x3 solve, a 2x2
/// sub-solve, and symmetric inverse extraction.
#[derive(Clone, Copy, Debug, Default)]
pub struct Mat33 {
    /// First column
    pub ex: Vec3,
    /// Second column
    pub ey: Vec3,
    /// Third column
    pub ez: Vec3,
}

impl Mat33 {
    /// Zero matrix
    pub const ZERO: Self = Self {
        ex: Vec3::ZERO,
        ey: Vec3::ZERO,
        ez: Vec3::ZERO,
    };

    /// Solve `A * x = b` for the full 3x3 system
    pub fn solve33(&self, b: Vec3) -> Vec3 {
        let mut det = self.ex.dot(self.ey.cross(self.ez));
        if det != 0.0 {
            det = 1.0 / det;
        }
        Vec3::new(
            det * b.dot(self.ey.cross(self.ez)),
            det * self.ex.dot(b.cross(self.ez)),
            det * self.ex.dot(self.ey.cross(b)),
        )
    }

    /// Solve `A * x = b` using only the upper-left 2x2 block
    pub fn solve22(&self, b: Vec2) -> Vec2 {
        let a11 = self.ex.x;
        let a12 = self.ey.x;
        let a21 = self.ex.y;
        let a22 = self.ey.y;
        let mut det = a11 * a22 - a12 * a21;
        if det != 0.0 {
            det = 1.0 / det;
        }
        Vec2::new(det * (a22 * b.x - a12 * b.y), det * (a11 * b.y - a21 * b.x))
    }

    /// Inverse of the upper-left 2x2 block, written into a 3x3 with zero z terms
    pub fn inverse22(&self) -> Self {
        let a = self.ex.x;
        let b = self.ey.x;
        let c = self.ex.y;
        let d = self.ey.y;
        let mut det = a * d - b * c;
        if det != 0.0 {
            det = 1.0 / det;
        }
        Self {
            ex: Vec3::new(det * d, -det * c, 0.0),
            ey: Vec3::new(-det * b, det * a, 0.0),
            ez: Vec3::ZERO,
        }
    }

    /// Symmetric inverse of the full 3x3 (used by soft 3-DOF constraints)
    pub fn sym_inverse33(&self) -> Self {
        let mut det = self.ex.dot(self.ey.cross(self.ez));
        if det != 0.0 {
            det = 1.0 / det;
        }
        let a11 = self.ex.x;
        let a12 = self.ey.x;
        let a13 = self.ez.x;
        let a22 = self.ey.y;
        let a23 = self.ez.y;
        let a33 = self.ez.z;

        let ex = Vec3::new(
            det * (a22 * a33 - a23 * a23),
            det * (a13 * a23 - a12 * a33),
            det * (a12 * a23 - a13 * a22),
        );
        let ey = Vec3::new(
            ex.y,
            det * (a11 * a33 - a13 * a13),
            det * (a13 * a12 - a11 * a23),
        );
        let ez = Vec3::new(ex.z, ey.z, det * (a11 * a22 - a12 * a12));
        Self { ex, ey, ez }
    }
}

// ============================================================================
// Rot
// ============================================================================

/// A 2D rotation stored as a (sin, cos) pair
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Rot {
    /// Sine of the angle
    pub s: f32,
    /// Cosine of the angle
    pub c: f32,
}

impl Rot {
    /// No rotation
    pub const IDENTITY: Self = Self { s: 0.0, c: 1.0 };

    /// Create from an angle in radians
    #[inline]
    pub fn from_angle(angle: f32) -> Self {
        Self {
            s: sin(angle),
            c: cos(angle),
        }
    }

    /// Recover the angle in radians
    #[inline]
    pub fn angle(self) -> f32 {
        atan2(self.s, self.c)
    }

    /// The rotated X axis (first matrix column)
    #[inline]
    pub fn x_axis(self) -> Vec2 {
        Vec2::new(self.c, self.s)
    }

    /// The rotated Y axis (second matrix column)
    #[inline]
    pub fn y_axis(self) -> Vec2 {
        Vec2::new(-self.s, self.c)
    }

    /// Compose: `self * rhs`
    #[inline]
    pub fn mul(self, rhs: Self) -> Self {
        Self {
            s: self.s * rhs.c + self.c * rhs.s,
            c: self.c * rhs.c - self.s * rhs.s,
        }
    }

    /// Compose with the inverse of self: `selfᵀ * rhs`
    #[inline]
    pub fn mul_t(self, rhs: Self) -> Self {
        Self {
            s: self.c * rhs.s - self.s * rhs.c,
            c: self.c * rhs.c + self.s * rhs.s,
        }
    }

    /// Rotate a vector
    #[inline]
    pub fn rotate(self, v: Vec2) -> Vec2 {
        Vec2::new(self.c * v.x - self.s * v.y, self.s * v.x + self.c * v.y)
    }

    /// Inverse-rotate a vector
    #[inline]
    pub fn inv_rotate(self, v: Vec2) -> Vec2 {
        Vec2::new(self.c * v.x + self.s * v.y, -self.s * v.x + self.c * v.y)
    }
}

impl Default for Rot {
    #[inline]
    fn default() -> Self {
        Self::IDENTITY
    }
}

// ============================================================================
// Transform
// ============================================================================

/// A rigid transform: rotation followed by translation
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Transform {
    /// Translation
    pub p: Vec2,
    /// Rotation
    pub q: Rot,
}

impl Transform {
    /// Identity transform
    pub const IDENTITY: Self = Self {
        p: Vec2::ZERO,
        q: Rot::IDENTITY,
    };

    /// Create from a position and an angle
    #[inline]
    pub fn new(position: Vec2, angle: f32) -> Self {
        Self {
            p: position,
            q: Rot::from_angle(angle),
        }
    }

    /// Transform a local point to world space
    #[inline]
    pub fn transform_point(self, v: Vec2) -> Vec2 {
        self.q.rotate(v) + self.p
    }

    /// Transform a world point to local space
    #[inline]
    pub fn inv_transform_point(self, v: Vec2) -> Vec2 {
        self.q.inv_rotate(v - self.p)
    }

    /// Compose: `self * rhs` (apply rhs first)
    #[inline]
    pub fn mul(self, rhs: Self) -> Self {
        Self {
            q: self.q.mul(rhs.q),
            p: self.q.rotate(rhs.p) + self.p,
        }
    }

    /// Compose with the inverse of self: `self⁻¹ * rhs`
    #[inline]
    pub fn mul_t(self, rhs: Self) -> Self {
        Self {
            q: self.q.mul_t(rhs.q),
            p: self.q.inv_rotate(rhs.p - self.p),
        }
    }
}

// ============================================================================
// Sweep
// ============================================================================

/// Motion of a body's center of mass and angle across one timestep.
///
/// The interval is parameterized over [0, 1]; `alpha0` marks how much of it
/// has already been consumed by earlier TOI sub-steps this frame.
#[derive(Clone, Copy, Debug, Default)]
pub struct Sweep {
    /// Center of mass in body-local coordinates
    pub local_center: Vec2,
    /// World center at alpha0
    pub c0: Vec2,
    /// World center at the end of the step
    pub c: Vec2,
    /// Angle at alpha0
    pub a0: f32,
    /// Angle at the end of the step
    pub a: f32,
    /// Fraction of the step already consumed by TOI advancement
    pub alpha0: f32,
}

impl Sweep {
    /// Interpolated transform at `beta` ∈ [0, 1], where 0 is alpha0
    pub fn transform_at(&self, beta: f32) -> Transform {
        let p = self.c0 * (1.0 - beta) + self.c * beta;
        let angle = (1.0 - beta) * self.a0 + beta * self.a;
        let q = Rot::from_angle(angle);
        // The sweep tracks the center of mass; shift back to the body origin.
        Transform {
            p: p - q.rotate(self.local_center),
            q,
        }
    }

    /// Advance the start of the interval to `alpha` (alpha0 <= alpha < 1)
    pub fn advance(&mut self, alpha: f32) {
        debug_assert!(self.alpha0 < 1.0);
        let beta = (alpha - self.alpha0) / (1.0 - self.alpha0);
        self.c0 += (self.c - self.c0) * beta;
        self.a0 += beta * (self.a - self.a0);
        self.alpha0 = alpha;
    }

    /// Normalize the angles to [-π, π] to keep them from growing unbounded
    pub fn normalize(&mut self) {
        let two_pi = 2.0 * PI;
        let d = two_pi * floor(self.a0 / two_pi);
        self.a0 -= d;
        self.a -= d;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vec2_ops() {
        let a = Vec2::new(3.0, 4.0);
        assert_eq!(a.length(), 5.0);
        assert_eq!(a.dot(Vec2::new(1.0, 0.0)), 3.0);
        assert_eq!(Vec2::UNIT_X.cross(Vec2::UNIT_Y), 1.0);
        assert_eq!(Vec2::UNIT_Y.cross(Vec2::UNIT_X), -1.0);
    }

    #[test]
    fn test_vec2_normalize() {
        let mut v = Vec2::new(10.0, 0.0);
        let len = v.normalize();
        assert_eq!(len, 10.0);
        assert_eq!(v, Vec2::UNIT_X);

        let mut zero = Vec2::ZERO;
        assert_eq!(zero.normalize(), 0.0);
        assert_eq!(zero, Vec2::ZERO);
    }

    #[test]
    fn test_cross_identities() {
        // s × v is perpendicular to v, v × s the opposite way
        let v = Vec2::new(2.0, 1.0);
        let a = Vec2::scalar_cross(1.0, v);
        let b = v.cross_scalar(1.0);
        assert_eq!(a, Vec2::new(-1.0, 2.0));
        assert_eq!(b, Vec2::new(1.0, -2.0));
        assert_eq!(a, -b);
    }

    #[test]
    fn test_rot_roundtrip() {
        let q = Rot::from_angle(0.7);
        let v = Vec2::new(1.0, 2.0);
        let r = q.inv_rotate(q.rotate(v));
        assert!((r.x - v.x).abs() < 1e-6);
        assert!((r.y - v.y).abs() < 1e-6);
        assert!((q.angle() - 0.7).abs() < 1e-6);
    }

    #[test]
    fn test_transform_roundtrip() {
        let xf = Transform::new(Vec2::new(5.0, -3.0), 1.2);
        let p = Vec2::new(-2.0, 7.0);
        let r = xf.inv_transform_point(xf.transform_point(p));
        assert!((r.x - p.x).abs() < 1e-5);
        assert!((r.y - p.y).abs() < 1e-5);
    }

    #[test]
    fn test_transform_compose() {
        let a = Transform::new(Vec2::new(1.0, 0.0), 0.5);
        let b = Transform::new(Vec2::new(0.0, 2.0), -0.25);
        let p = Vec2::new(0.3, 0.4);
        let direct = a.transform_point(b.transform_point(p));
        let composed = a.mul(b).transform_point(p);
        assert!((direct - composed).length() < 1e-5);
    }

    #[test]
    fn test_mat22_solve() {
        let m = Mat22::new(Vec2::new(2.0, 0.0), Vec2::new(0.0, 4.0));
        let x = m.solve(Vec2::new(2.0, 8.0));
        assert_eq!(x, Vec2::new(1.0, 2.0));

        // Singular matrix yields zero, not NaN
        let s = Mat22::new(Vec2::ZERO, Vec2::ZERO);
        let x = s.solve(Vec2::new(1.0, 1.0));
        assert_eq!(x, Vec2::ZERO);
    }

    #[test]
    fn test_mat33_solve() {
        let m = Mat33 {
            ex: Vec3::new(2.0, 0.0, 0.0),
            ey: Vec3::new(0.0, 3.0, 0.0),
            ez: Vec3::new(0.0, 0.0, 4.0),
        };
        let x = m.solve33(Vec3::new(2.0, 6.0, 12.0));
        assert!((x.x - 1.0).abs() < 1e-6);
        assert!((x.y - 2.0).abs() < 1e-6);
        assert!((x.z - 3.0).abs() < 1e-6);
    }

    #[test]
    fn test_sweep_advance() {
        let mut sweep = Sweep {
            local_center: Vec2::ZERO,
            c0: Vec2::ZERO,
            c: Vec2::new(10.0, 0.0),
            a0: 0.0,
            a: 1.0,
            alpha0: 0.0,
        };

        sweep.advance(0.5);
        assert!((sweep.c0.x - 5.0).abs() < 1e-6);
        assert!((sweep.a0 - 0.5).abs() < 1e-6);
        assert_eq!(sweep.alpha0, 0.5);

        // Transform at beta=0 matches the advanced start
        let xf = sweep.transform_at(0.0);
        assert!((xf.p.x - 5.0).abs() < 1e-5);
    }

    #[test]
    fn test_sweep_normalize() {
        let mut sweep = Sweep {
            a0: 7.0 * PI,
            a: 7.5 * PI,
            ..Default::default()
        };
        sweep.normalize();
        assert!(sweep.a0 >= -2.0 * PI && sweep.a0 <= 2.0 * PI);
        // Relative angle preserved
        assert!(((sweep.a - sweep.a0) - 0.5 * PI).abs() < 1e-4);
    }
}
