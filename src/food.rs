use rand::Rng;
use rand::seq::IteratorRandom;

use crate::border::Border;
use crate::error::StarvationError;
use crate::snake::Snake;
use crate::utils::Point;

/// Random probes before falling back to enumerating the free cells.
const MAX_PROBES: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Food {
    pub position: Point,
}

impl Food {
    pub fn at(position: Point) -> Self {
        Self { position }
    }

    /// Places food on a uniformly random cell not covered by `snake`.
    pub fn spawn<R: Rng + ?Sized>(rng: &mut R, border: &Border, snake: &Snake) -> Result<Food, StarvationError> {
        let cells = border.cell_count();
        let occupied = snake.segments().filter(|p| border.is_inside(**p)).count();
        if occupied >= cells {
            return Err(StarvationError { occupied, cells });
        }

        for _ in 0..MAX_PROBES {
            let pos = Point::new(
                rng.gen_range(0..border.columns()) * border.cell,
                rng.gen_range(0..border.rows()) * border.cell,
            );
            if !snake.contains(pos) {
                return Ok(Food::at(pos));
            }
        }

        // crowded board: pick directly among the free cells
        border
            .cells()
            .filter(|p| !snake.contains(*p))
            .choose(rng)
            .map(Food::at)
            .ok_or(StarvationError { occupied, cells })
    }

    pub fn respawn<R: Rng + ?Sized>(&mut self, rng: &mut R, border: &Border, snake: &Snake) -> Result<(), StarvationError> {
        *self = Food::spawn(rng, border, snake)?;
        Ok(())
    }
}
