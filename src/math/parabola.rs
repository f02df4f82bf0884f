//! Three-point parabolic interpolation around a discrete minimum.
//!
//! Given samples `y(-1)`, `y(0)`, `y(+1)` the parabola through them is
//!
//! - `y(δ) = y0 + b δ + a δ²`
//! - `b = (y(+1) - y(-1)) / 2`
//! - `a = (y(+1) + y(-1) - 2 y0) / 2`
//!
//! The vertex sits at `δ = -b / (2a)`. It is clipped to `[-1, 1]` so that the refined position
//! never leaves the bracket formed by the two neighbours.

/// Refined minimum position (in samples, relative to the centre) and value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Vertex {
    pub offset: f64,
    pub value: f64,
}

/// Vertex of the parabola through three equally spaced samples.
///
/// If the samples are not convex (no interior minimum) the centre sample is returned unchanged.
pub fn parabola_vertex(y_minus: f64, y0: f64, y_plus: f64) -> Vertex {
    let a = 0.5 * (y_plus + y_minus - 2.0 * y0);
    let b = 0.5 * (y_plus - y_minus);
    if !(a.is_finite() && b.is_finite() && a > 0.0) {
        return Vertex {
            offset: 0.0,
            value: y0,
        };
    }
    let offset = (-b / (2.0 * a)).clamp(-1.0, 1.0);
    Vertex {
        offset,
        value: y0 + b * offset + a * offset * offset,
    }
}

/// Evaluate the parabola through three equally spaced samples at `offset`.
pub fn parabola_at(y_minus: f64, y0: f64, y_plus: f64, offset: f64) -> f64 {
    let a = 0.5 * (y_plus + y_minus - 2.0 * y0);
    let b = 0.5 * (y_plus - y_minus);
    y0 + b * offset + a * offset * offset
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recovers_exact_parabola_vertex() {
        // y = 2 (δ - 0.3)^2 + 1
        let f = |d: f64| 2.0 * (d - 0.3) * (d - 0.3) + 1.0;
        let v = parabola_vertex(f(-1.0), f(0.0), f(1.0));
        assert!((v.offset - 0.3).abs() < 1e-12);
        assert!((v.value - 1.0).abs() < 1e-12);
    }

    #[test]
    fn vertex_is_clipped_to_bracket() {
        let v = parabola_vertex(10.0, 5.0, 4.9);
        assert!(v.offset <= 1.0 && v.offset >= -1.0);
    }

    #[test]
    fn concave_samples_do_not_move() {
        let v = parabola_vertex(0.0, 1.0, 0.0);
        assert_eq!(v.offset, 0.0);
        assert_eq!(v.value, 1.0);
    }

    #[test]
    fn parabola_at_matches_samples() {
        assert_eq!(parabola_at(3.0, 1.0, 2.0, -1.0), 3.0);
        assert_eq!(parabola_at(3.0, 1.0, 2.0, 0.0), 1.0);
        assert_eq!(parabola_at(3.0, 1.0, 2.0, 1.0), 2.0);
    }
}
