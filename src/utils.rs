use serde::{Deserialize, Serialize};

/// Pixel coordinates of a cell's top-left corner.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Point shifted by `(dx, dy)` cells of size `cell`.
    pub fn offset(self, (dx, dy): (i32, i32), cell: i32) -> Point {
        Point { x: self.x + dx * cell, y: self.y + dy * cell }
    }
}

/// Index of the largest value; ties go to the lowest index.
/// An empty slice yields 0.
pub fn argmax(v: &[f32]) -> usize {
    let mut best_i = 0;
    let mut best_v = f32::NEG_INFINITY;
    for (i, &x) in v.iter().enumerate() {
        // strict `>` keeps the first of equal maxima
        if x > best_v {
            best_v = x;
            best_i = i;
        }
    }
    best_i
}

/// Largest value of a slice, or 0.0 when empty.
pub fn max_value(v: &[f32]) -> f32 {
    if v.is_empty() {
        return 0.0;
    }
    v.iter().copied().fold(f32::NEG_INFINITY, f32::max)
}

pub fn has_non_finite(xs: &[f32]) -> bool {
    xs.iter().any(|&v| !v.is_finite())
}

/// min / max / mean of a slice.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Stats {
    pub min: f32,
    pub max: f32,
    pub mean: f32,
}

pub fn vec_stats(xs: &[f32]) -> Stats {
    if xs.is_empty() {
        return Stats { min: 0.0, max: 0.0, mean: 0.0 };
    }
    let mut mn = xs[0];
    let mut mx = xs[0];
    let mut sum = 0.0f32;
    for &v in xs {
        mn = mn.min(v);
        mx = mx.max(v);
        sum += v;
    }
    Stats { min: mn, max: mx, mean: sum / xs.len() as f32 }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn argmax_prefers_lowest_index_on_ties() {
        assert_eq!(argmax(&[1.0, 3.0, 3.0, 2.0]), 1);
        assert_eq!(argmax(&[0.0, 0.0, 0.0]), 0);
        assert_eq!(argmax(&[-5.0, -1.0, -1.0]), 1);
    }

    #[test]
    fn max_value_of_empty_is_zero() {
        assert_eq!(max_value(&[]), 0.0);
        assert_eq!(max_value(&[-2.0, -3.0]), -2.0);
    }

    #[test]
    fn stats_summarise_slice() {
        let s = vec_stats(&[1.0, -1.0, 3.0]);
        assert_eq!(s.min, -1.0);
        assert_eq!(s.max, 3.0);
        assert!((s.mean - 1.0).abs() < 1e-6);
        assert!(has_non_finite(&[0.0, f32::NAN]));
        assert!(!has_non_finite(&[0.0, 1.0]));
    }

    #[test]
    fn offset_moves_by_whole_cells() {
        let p = Point::new(300, 200);
        assert_eq!(p.offset((1, 0), 20), Point::new(320, 200));
        assert_eq!(p.offset((0, -1), 20), Point::new(300, 180));
    }
}
