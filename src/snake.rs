use std::collections::VecDeque;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::utils::Point;

/// Compass heading. Screen coordinates: `y` grows downwards.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Hash, Serialize, Deserialize)]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
}

impl Direction {
    /// Order used by the absolute action set and the heading one-hot.
    pub const ALL: [Direction; 4] = [Direction::Up, Direction::Down, Direction::Left, Direction::Right];

    pub fn opposite(&self) -> Direction {
        match self {
            Direction::Up => Direction::Down,
            Direction::Down => Direction::Up,
            Direction::Left => Direction::Right,
            Direction::Right => Direction::Left,
        }
    }

    /// 90° counter-clockwise.
    pub fn left(&self) -> Direction {
        match self {
            Direction::Up => Direction::Left,
            Direction::Down => Direction::Right,
            Direction::Left => Direction::Down,
            Direction::Right => Direction::Up,
        }
    }

    /// 90° clockwise.
    pub fn right(&self) -> Direction {
        match self {
            Direction::Up => Direction::Right,
            Direction::Down => Direction::Left,
            Direction::Left => Direction::Up,
            Direction::Right => Direction::Down,
        }
    }

    /// Unit step `(dx, dy)` in cells.
    pub fn delta(&self) -> (i32, i32) {
        match self {
            Direction::Up => (0, -1),
            Direction::Down => (0, 1),
            Direction::Left => (-1, 0),
            Direction::Right => (1, 0),
        }
    }

    /// Position in [`Direction::ALL`].
    pub fn index(&self) -> usize {
        match self {
            Direction::Up => 0,
            Direction::Down => 1,
            Direction::Left => 2,
            Direction::Right => 3,
        }
    }

    pub fn random<R: Rng + ?Sized>(rng: &mut R) -> Direction {
        Direction::ALL[rng.gen_range(0..Direction::ALL.len())]
    }
}

/// Snake body, head first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snake {
    body: VecDeque<Point>,
    pub direction: Direction,
}

impl Snake {
    /// Straight snake of `len` segments trailing behind `head`.
    pub fn new(head: Point, len: usize, direction: Direction, cell: i32) -> Snake {
        let tail = direction.opposite().delta();
        let body = (0..len as i32).map(|i| head.offset((tail.0 * i, tail.1 * i), cell)).collect();
        Snake { body, direction }
    }

    pub fn from_segments(segments: Vec<Point>, direction: Direction) -> Snake {
        Snake { body: segments.into(), direction }
    }

    pub fn head(&self) -> Point {
        self.body[0]
    }

    pub fn len(&self) -> usize {
        self.body.len()
    }

    pub fn is_empty(&self) -> bool {
        self.body.is_empty()
    }

    pub fn segments(&self) -> impl Iterator<Item = &Point> {
        self.body.iter()
    }

    pub fn contains(&self, p: Point) -> bool {
        self.body.contains(&p)
    }

    /// True when `p` lies on any segment other than the head.
    pub fn hits_body(&self, p: Point) -> bool {
        self.body.iter().skip(1).any(|&s| s == p)
    }

    pub fn push_head(&mut self, p: Point) {
        self.body.push_front(p);
    }

    pub fn pop_tail(&mut self) -> Option<Point> {
        self.body.pop_back()
    }

    pub fn to_vec(&self) -> Vec<Point> {
        self.body.iter().copied().collect()
    }
}
