//! Continuous Collision Detection (Time of Impact)
//!
//! Finds the earliest time in [0, t_max] at which two swept convex shapes
//! reach their contact distance, so fast bodies stop at surfaces instead of
//! tunneling through them.
//!
//! # Algorithm
//!
//! - GJK seeds a **separation function** built from the closest features
//!   (point-point, point-face A, point-face B)
//! - The outer loop advances t1 while the shapes remain separated
//! - The inner loop brackets the contact time with bisection-augmented
//!   secant steps, resetting on overshoot so convergence is monotone
//! - All loops carry fixed iteration caps; on cap the query reports
//!   `Failed` with the best t found and the caller proceeds with it
//!
//! Author: Moroya Sakamoto

use crate::distance::{distance, DistanceInput, DistanceProxy, SimplexCache};
use crate::math::{Sweep, Transform, Vec2};
use crate::tuning::{
    LINEAR_SLOP, MAX_POLYGON_VERTICES, MAX_TOI_ITERATIONS, MAX_TOI_ROOT_ITERATIONS,
};

// ============================================================================
// Input / output
// ============================================================================

/// Input to [`time_of_impact`]
#[derive(Clone, Debug)]
pub struct ToiInput {
    /// Proxy for shape A
    pub proxy_a: DistanceProxy,
    /// Proxy for shape B
    pub proxy_b: DistanceProxy,
    /// Sweep of body A over the step
    pub sweep_a: Sweep,
    /// Sweep of body B over the step
    pub sweep_b: Sweep,
    /// Portion of the sweep to search, usually 1.0
    pub t_max: f32,
}

/// Terminal state of a TOI query
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ToiState {
    /// Query did not run to a conclusion
    Unknown,
    /// Iteration cap hit; `t` is the best bound found
    Failed,
    /// Shapes already overlap at t = 0
    Overlapped,
    /// Shapes reach contact distance at `t`
    Touching,
    /// Shapes stay separated through t_max
    Separated,
}

/// Output of [`time_of_impact`]
#[derive(Clone, Copy, Debug)]
pub struct ToiOutput {
    /// How the query terminated
    pub state: ToiState,
    /// Earliest contact time, or t_max when separated
    pub t: f32,
}

// ============================================================================
// Separation function
// ============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum SeparationType {
    Points,
    FaceA,
    FaceB,
}

/// Signed separation along a tracked axis, evaluated at any sweep time
struct SeparationFunction<'a> {
    proxy_a: &'a DistanceProxy,
    proxy_b: &'a DistanceProxy,
    sweep_a: Sweep,
    sweep_b: Sweep,
    kind: SeparationType,
    local_point: Vec2,
    axis: Vec2,
}

impl<'a> SeparationFunction<'a> {
    /// Build from the simplex cache of a distance query at time t1
    fn new(
        cache: &SimplexCache,
        proxy_a: &'a DistanceProxy,
        sweep_a: Sweep,
        proxy_b: &'a DistanceProxy,
        sweep_b: Sweep,
        t1: f32,
    ) -> Self {
        debug_assert!(0 < cache.count && cache.count < 3);

        let xf_a = sweep_a.transform_at(t1);
        let xf_b = sweep_b.transform_at(t1);

        if cache.count == 1 {
            // Closest features are single points
            let local_point_a = proxy_a.vertex(cache.index_a[0] as usize);
            let local_point_b = proxy_b.vertex(cache.index_b[0] as usize);
            let point_a = xf_a.transform_point(local_point_a);
            let point_b = xf_b.transform_point(local_point_b);
            let mut axis = point_b - point_a;
            axis.normalize();
            Self {
                proxy_a,
                proxy_b,
                sweep_a,
                sweep_b,
                kind: SeparationType::Points,
                local_point: Vec2::ZERO,
                axis,
            }
        } else if cache.index_a[0] == cache.index_a[1] {
            // Two support points on B: separation axis is B's face normal
            let local_point_b1 = proxy_b.vertex(cache.index_b[0] as usize);
            let local_point_b2 = proxy_b.vertex(cache.index_b[1] as usize);

            let mut axis = (local_point_b2 - local_point_b1).cross_scalar(1.0);
            axis.normalize();
            let normal = xf_b.q.rotate(axis);

            let local_point = (local_point_b1 + local_point_b2) * 0.5;
            let point_b = xf_b.transform_point(local_point);

            let local_point_a = proxy_a.vertex(cache.index_a[0] as usize);
            let point_a = xf_a.transform_point(local_point_a);

            let s = (point_a - point_b).dot(normal);
            if s < 0.0 {
                axis = -axis;
            }
            Self {
                proxy_a,
                proxy_b,
                sweep_a,
                sweep_b,
                kind: SeparationType::FaceB,
                local_point,
                axis,
            }
        } else {
            // Two support points on A: separation axis is A's face normal
            let local_point_a1 = proxy_a.vertex(cache.index_a[0] as usize);
            let local_point_a2 = proxy_a.vertex(cache.index_a[1] as usize);

            let mut axis = (local_point_a2 - local_point_a1).cross_scalar(1.0);
            axis.normalize();
            let normal = xf_a.q.rotate(axis);

            let local_point = (local_point_a1 + local_point_a2) * 0.5;
            let point_a = xf_a.transform_point(local_point);

            let local_point_b = proxy_b.vertex(cache.index_b[0] as usize);
            let point_b = xf_b.transform_point(local_point_b);

            let s = (point_b - point_a).dot(normal);
            if s < 0.0 {
                axis = -axis;
            }
            Self {
                proxy_a,
                proxy_b,
                sweep_a,
                sweep_b,
                kind: SeparationType::FaceA,
                local_point,
                axis,
            }
        }
    }

    /// Minimum separation over all support pairs at time t, with the
    /// achieving vertex indices
    fn find_min_separation(&self, t: f32) -> (f32, usize, usize) {
        let xf_a = self.sweep_a.transform_at(t);
        let xf_b = self.sweep_b.transform_at(t);

        match self.kind {
            SeparationType::Points => {
                let axis_a = xf_a.q.inv_rotate(self.axis);
                let axis_b = xf_b.q.inv_rotate(-self.axis);

                let index_a = self.proxy_a.support(axis_a);
                let index_b = self.proxy_b.support(axis_b);

                let point_a = xf_a.transform_point(self.proxy_a.vertex(index_a));
                let point_b = xf_b.transform_point(self.proxy_b.vertex(index_b));

                ((point_b - point_a).dot(self.axis), index_a, index_b)
            }
            SeparationType::FaceA => {
                let normal = xf_a.q.rotate(self.axis);
                let point_a = xf_a.transform_point(self.local_point);

                let axis_b = xf_b.q.inv_rotate(-normal);
                let index_b = self.proxy_b.support(axis_b);
                let point_b = xf_b.transform_point(self.proxy_b.vertex(index_b));

                ((point_b - point_a).dot(normal), usize::MAX, index_b)
            }
            SeparationType::FaceB => {
                let normal = xf_b.q.rotate(self.axis);
                let point_b = xf_b.transform_point(self.local_point);

                let axis_a = xf_a.q.inv_rotate(-normal);
                let index_a = self.proxy_a.support(axis_a);
                let point_a = xf_a.transform_point(self.proxy_a.vertex(index_a));

                ((point_a - point_b).dot(normal), index_a, usize::MAX)
            }
        }
    }

    /// Separation of a fixed support pair at time t
    fn evaluate(&self, index_a: usize, index_b: usize, t: f32) -> f32 {
        let xf_a = self.sweep_a.transform_at(t);
        let xf_b = self.sweep_b.transform_at(t);

        match self.kind {
            SeparationType::Points => {
                let point_a = xf_a.transform_point(self.proxy_a.vertex(index_a));
                let point_b = xf_b.transform_point(self.proxy_b.vertex(index_b));
                (point_b - point_a).dot(self.axis)
            }
            SeparationType::FaceA => {
                let normal = xf_a.q.rotate(self.axis);
                let point_a = xf_a.transform_point(self.local_point);
                let point_b = xf_b.transform_point(self.proxy_b.vertex(index_b));
                (point_b - point_a).dot(normal)
            }
            SeparationType::FaceB => {
                let normal = xf_b.q.rotate(self.axis);
                let point_b = xf_b.transform_point(self.local_point);
                let point_a = xf_a.transform_point(self.proxy_a.vertex(index_a));
                (point_a - point_b).dot(normal)
            }
        }
    }
}

// ============================================================================
// Time of impact
// ============================================================================

/// Earliest time in [0, t_max] at which the swept proxies reach their
/// contact distance (sum of radii minus the slop band).
pub fn time_of_impact(input: &ToiInput) -> ToiOutput {
    let mut output = ToiOutput {
        state: ToiState::Unknown,
        t: input.t_max,
    };

    let proxy_a = &input.proxy_a;
    let proxy_b = &input.proxy_b;

    // Large rotations make the root finder chase a moving target; keep the
    // angles bounded.
    let mut sweep_a = input.sweep_a;
    let mut sweep_b = input.sweep_b;
    sweep_a.normalize();
    sweep_b.normalize();

    let t_max = input.t_max;

    let total_radius = proxy_a.radius + proxy_b.radius;
    let target = LINEAR_SLOP.max(total_radius - 3.0 * LINEAR_SLOP);
    let tolerance = 0.25 * LINEAR_SLOP;
    debug_assert!(target > tolerance);

    let mut t1 = 0.0_f32;
    let mut iteration = 0;
    let mut cache = SimplexCache::default();

    loop {
        let xf_a = sweep_a.transform_at(t1);
        let xf_b = sweep_b.transform_at(t1);

        // True separation at t1 (radii handled through `target`)
        let dist_input = DistanceInput {
            proxy_a: proxy_a.clone(),
            proxy_b: proxy_b.clone(),
            transform_a: xf_a,
            transform_b: xf_b,
            use_radii: false,
        };
        let dist_output = distance(&mut cache, &dist_input);

        if dist_output.distance <= 0.0 {
            output.state = ToiState::Overlapped;
            output.t = 0.0;
            break;
        }

        if dist_output.distance < target + tolerance {
            output.state = ToiState::Touching;
            output.t = t1;
            break;
        }

        let fcn = SeparationFunction::new(&cache, proxy_a, sweep_a, proxy_b, sweep_b, t1);

        // Resolve deepest-point candidates one at a time; each pass either
        // advances t1 or concludes the query.
        let mut done = false;
        let mut t2 = t_max;
        let mut push_back_iteration = 0;
        loop {
            let (mut s2, index_a, index_b) = fcn.find_min_separation(t2);

            if s2 > target + tolerance {
                output.state = ToiState::Separated;
                output.t = t_max;
                done = true;
                break;
            }

            if s2 > target - tolerance {
                // This feature touches right at t2; restart the outer loop there
                t1 = t2;
                break;
            }

            let mut s1 = fcn.evaluate(index_a, index_b, t1);

            if s1 < target - tolerance {
                // The interval start is already past the target: the
                // advancement fell behind (tolerance too tight)
                output.state = ToiState::Failed;
                output.t = t1;
                done = true;
                break;
            }

            if s1 <= target + tolerance {
                output.state = ToiState::Touching;
                output.t = t1;
                done = true;
                break;
            }

            // Root find on [t1, t2]; alternate secant with bisection
            let mut root_iteration = 0;
            let mut a1 = t1;
            let mut a2 = t2;
            loop {
                let t = if root_iteration & 1 == 1 {
                    a1 + (target - s1) * (a2 - a1) / (s2 - s1)
                } else {
                    0.5 * (a1 + a2)
                };

                root_iteration += 1;

                let s = fcn.evaluate(index_a, index_b, t);

                if (s - target).abs() < tolerance {
                    t2 = t;
                    break;
                }

                if s > target {
                    a1 = t;
                    s1 = s;
                } else {
                    a2 = t;
                    s2 = s;
                }

                if root_iteration == MAX_TOI_ROOT_ITERATIONS {
                    break;
                }
            }

            push_back_iteration += 1;
            if push_back_iteration == MAX_POLYGON_VERTICES {
                break;
            }
        }

        iteration += 1;

        if done {
            break;
        }

        if iteration == MAX_TOI_ITERATIONS {
            output.state = ToiState::Failed;
            output.t = t1;
            break;
        }
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::circle::CircleShape;
    use crate::collider::Shape;
    use crate::polygon::PolygonShape;

    fn circle_proxy(radius: f32) -> DistanceProxy {
        DistanceProxy::from_shape(&Shape::Circle(CircleShape::new(Vec2::ZERO, radius)), 0)
    }

    fn static_sweep(x: f32, y: f32) -> Sweep {
        Sweep {
            local_center: Vec2::ZERO,
            c0: Vec2::new(x, y),
            c: Vec2::new(x, y),
            a0: 0.0,
            a: 0.0,
            alpha0: 0.0,
        }
    }

    fn moving_sweep(from: Vec2, to: Vec2) -> Sweep {
        Sweep {
            local_center: Vec2::ZERO,
            c0: from,
            c: to,
            a0: 0.0,
            a: 0.0,
            alpha0: 0.0,
        }
    }

    #[test]
    fn test_head_on_touching() {
        // Unit circles closing from 10 apart to 0: surfaces meet at t≈0.8
        let input = ToiInput {
            proxy_a: circle_proxy(1.0),
            proxy_b: circle_proxy(1.0),
            sweep_a: static_sweep(0.0, 0.0),
            sweep_b: moving_sweep(Vec2::new(10.0, 0.0), Vec2::new(0.0, 0.0)),
            t_max: 1.0,
        };
        let out = time_of_impact(&input);
        assert_eq!(out.state, ToiState::Touching);
        assert!((out.t - 0.8).abs() < 0.02, "t = {}", out.t);
    }

    #[test]
    fn test_separated() {
        let input = ToiInput {
            proxy_a: circle_proxy(1.0),
            proxy_b: circle_proxy(1.0),
            sweep_a: static_sweep(0.0, 0.0),
            sweep_b: moving_sweep(Vec2::new(10.0, 5.0), Vec2::new(0.0, 5.0)),
            t_max: 1.0,
        };
        let out = time_of_impact(&input);
        assert_eq!(out.state, ToiState::Separated);
        assert_eq!(out.t, 1.0);
    }

    #[test]
    fn test_overlapped_at_start() {
        // Coincident centers: the point proxies themselves overlap
        let input = ToiInput {
            proxy_a: circle_proxy(1.0),
            proxy_b: circle_proxy(1.0),
            sweep_a: static_sweep(0.0, 0.0),
            sweep_b: moving_sweep(Vec2::new(0.0, 0.0), Vec2::new(5.0, 0.0)),
            t_max: 1.0,
        };
        let out = time_of_impact(&input);
        assert_eq!(out.state, ToiState::Overlapped);
        assert_eq!(out.t, 0.0);
    }

    #[test]
    fn test_touching_within_skins_at_start() {
        // Deep skin overlap but distinct centers: touching at t = 0
        let input = ToiInput {
            proxy_a: circle_proxy(1.0),
            proxy_b: circle_proxy(1.0),
            sweep_a: static_sweep(0.0, 0.0),
            sweep_b: moving_sweep(Vec2::new(0.5, 0.0), Vec2::new(5.0, 0.0)),
            t_max: 1.0,
        };
        let out = time_of_impact(&input);
        assert_eq!(out.state, ToiState::Touching);
        assert_eq!(out.t, 0.0);
    }

    #[test]
    fn test_box_tunneling_candidate() {
        // A small fast box crossing a wide thin box must report an impact
        let wall = DistanceProxy::from_shape(
            &Shape::Polygon(PolygonShape::new_box(0.1, 5.0)),
            0,
        );
        let bullet = DistanceProxy::from_shape(
            &Shape::Polygon(PolygonShape::new_box(0.1, 0.1)),
            0,
        );
        let input = ToiInput {
            proxy_a: wall,
            proxy_b: bullet,
            sweep_a: static_sweep(0.0, 0.0),
            sweep_b: moving_sweep(Vec2::new(-5.0, 0.0), Vec2::new(5.0, 0.0)),
            t_max: 1.0,
        };
        let out = time_of_impact(&input);
        assert_eq!(out.state, ToiState::Touching);
        // Surfaces meet near t = (5 - 0.2) / 10
        assert!(out.t > 0.4 && out.t < 0.5, "t = {}", out.t);
    }

    #[test]
    fn test_rotation_only_sweep() {
        // A rotating box near a circle: query must terminate within caps
        let rot_box = DistanceProxy::from_shape(
            &Shape::Polygon(PolygonShape::new_box(2.0, 0.2)),
            0,
        );
        let sweep_b = Sweep {
            local_center: Vec2::ZERO,
            c0: Vec2::new(0.0, 3.0),
            c: Vec2::new(0.0, 3.0),
            a0: 0.0,
            a: 3.0,
            alpha0: 0.0,
        };
        let input = ToiInput {
            proxy_a: circle_proxy(1.0),
            proxy_b: rot_box,
            sweep_a: static_sweep(0.0, 0.0),
            sweep_b,
            t_max: 1.0,
        };
        let out = time_of_impact(&input);
        assert_ne!(out.state, ToiState::Unknown);
        assert!(out.t >= 0.0 && out.t <= 1.0);
    }
}
