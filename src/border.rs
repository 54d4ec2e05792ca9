use crate::error::ConfigError;
use crate::utils::Point;

/// Board geometry in pixels; both sides are multiples of `cell`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Border {
    pub width: i32,
    pub height: i32,
    pub cell: i32,
}

impl Border {
    /// Fails when a side does not fit in `i32` or the cell count overflows.
    pub fn new(width: u32, height: u32, cell: u32) -> Result<Self, ConfigError> {
        let to_i32 = |v: u32, what: &str| {
            i32::try_from(v).map_err(|_| ConfigError::Invalid(format!("{what} {v} exceeds {}", i32::MAX)))
        };
        let border = Self {
            width: to_i32(width, "width")?,
            height: to_i32(height, "height")?,
            cell: to_i32(cell, "cell size")?,
        };
        if border.cell <= 0 {
            return Err(ConfigError::Invalid("cell size must be positive".into()));
        }
        if border.columns().checked_mul(border.rows()).is_none() {
            return Err(ConfigError::Invalid(format!("board {width}x{height} has too many cells")));
        }
        Ok(border)
    }

    pub fn is_inside(&self, p: Point) -> bool {
        p.x >= 0 && p.y >= 0 && p.x <= self.width - self.cell && p.y <= self.height - self.cell
    }

    pub fn columns(&self) -> i32 {
        self.width / self.cell
    }

    pub fn rows(&self) -> i32 {
        self.height / self.cell
    }

    pub fn cell_count(&self) -> usize {
        (self.columns() * self.rows()) as usize
    }

    /// Cell nearest the middle of the board, snapped to the grid.
    pub fn center(&self) -> Point {
        Point::new((self.columns() / 2) * self.cell, (self.rows() / 2) * self.cell)
    }

    /// All cells, row-major.
    pub fn cells(&self) -> impl Iterator<Item = Point> + '_ {
        (0..self.rows()).flat_map(move |r| {
            (0..self.columns()).map(move |c| Point::new(c * self.cell, r * self.cell))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bounds_follow_cell_size() {
        let b = Border::new(600, 400, 20).unwrap();
        assert!(b.is_inside(Point::new(0, 0)));
        assert!(b.is_inside(Point::new(580, 380)));
        assert!(!b.is_inside(Point::new(600, 200)));
        assert!(!b.is_inside(Point::new(-20, 200)));
        assert!(!b.is_inside(Point::new(300, 400)));
    }

    #[test]
    fn center_and_cells() {
        let b = Border::new(600, 400, 20).unwrap();
        assert_eq!(b.center(), Point::new(300, 200));
        assert_eq!(b.cell_count(), 30 * 20);
        assert_eq!(b.cells().count(), b.cell_count());
        assert!(b.cells().all(|p| b.is_inside(p)));
    }

    #[test]
    fn oversized_boards_are_rejected() {
        assert!(matches!(Border::new(4_000_000_000, 400, 20), Err(ConfigError::Invalid(_))));
        assert!(Border::new(600, 400, 3_000_000_000).is_err());
        // each side fits in i32, the cell count does not
        assert!(Border::new(2_000_000_000, 2_000_000_000, 20).is_err());
        assert!(Border::new(600, 400, 0).is_err());
    }
}
