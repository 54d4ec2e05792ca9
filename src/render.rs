use tracing::debug;

use crate::game::{Action, WorldState};
use crate::utils::Point;

/// Draws read-only snapshots of the board. Cannot touch the simulation.
pub trait Renderer {
    /// Called once per completed step.
    fn render(&mut self, snapshot: &WorldState);

    /// Polled by the trainer between episodes.
    fn termination_requested(&self) -> bool {
        false
    }
}

/// Source of actions when a person is playing.
pub trait HumanInput {
    fn poll_action(&mut self) -> Option<Action>;
}

/// Logs the board as ASCII at `debug` level and keeps the last frame.
#[derive(Debug, Default)]
pub struct TextRenderer {
    pub frames: u64,
    pub last_frame: Vec<String>,
    /// Request a stop after this many frames.
    pub stop_after: Option<u64>,
}

impl TextRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stopping_after(frames: u64) -> Self {
        Self { stop_after: Some(frames), ..Self::default() }
    }

    /// `H` head, `o` body, `*` food, `.` empty.
    pub fn draw(snapshot: &WorldState) -> Vec<String> {
        let border = snapshot.border();
        let (cols, rows) = (border.columns() as usize, border.rows() as usize);
        let mut grid = vec![vec!['.'; cols]; rows];
        let mut put = |p: Point, c: char| {
            if p.x < 0 || p.y < 0 {
                return;
            }
            let (col, row) = ((p.x / snapshot.cell) as usize, (p.y / snapshot.cell) as usize);
            if let Some(cell) = grid.get_mut(row).and_then(|r| r.get_mut(col)) {
                *cell = c;
            }
        };
        put(snapshot.food, '*');
        for p in snapshot.snake.iter().skip(1) {
            put(*p, 'o');
        }
        if let Some(head) = snapshot.snake.first() {
            put(*head, 'H');
        }
        grid.into_iter().map(|r| r.into_iter().collect()).collect()
    }
}

impl Renderer for TextRenderer {
    fn render(&mut self, snapshot: &WorldState) {
        self.frames += 1;
        self.last_frame = Self::draw(snapshot);
        debug!(frame = self.frames, score = snapshot.score, "\n{}", self.last_frame.join("\n"));
    }

    fn termination_requested(&self) -> bool {
        self.stop_after.is_some_and(|n| self.frames >= n)
    }
}

/// Replays a fixed list of actions, then runs dry.
#[derive(Debug, Default)]
pub struct ScriptedInput {
    actions: std::collections::VecDeque<Action>,
}

impl ScriptedInput {
    pub fn new(actions: impl IntoIterator<Item = Action>) -> Self {
        Self { actions: actions.into_iter().collect() }
    }
}

impl HumanInput for ScriptedInput {
    fn poll_action(&mut self) -> Option<Action> {
        self.actions.pop_front()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snake::Direction;

    fn snapshot() -> WorldState {
        WorldState {
            snake: vec![Point::new(40, 20), Point::new(20, 20), Point::new(0, 20)],
            direction: Direction::Right,
            food: Point::new(80, 60),
            score: 3,
            steps: 12,
            width: 100,
            height: 100,
            cell: 20,
        }
    }

    #[test]
    fn draws_snake_and_food() {
        let frame = TextRenderer::draw(&snapshot());
        assert_eq!(frame.len(), 5);
        assert_eq!(frame[0], ".....");
        assert_eq!(frame[1], "ooH..");
        assert_eq!(frame[3], "....*");
    }

    #[test]
    fn off_board_head_is_skipped() {
        let mut s = snapshot();
        s.snake.insert(0, Point::new(-20, 20));
        let frame = TextRenderer::draw(&s);
        assert_eq!(frame[1], "ooo..");
    }

    #[test]
    fn requests_stop_after_frame_limit() {
        let mut r = TextRenderer::stopping_after(2);
        r.render(&snapshot());
        assert!(!r.termination_requested());
        r.render(&snapshot());
        assert!(r.termination_requested());
        assert_eq!(r.frames, 2);
    }

    #[test]
    fn scripted_input_runs_dry() {
        let mut input = ScriptedInput::new([Action::TURN_LEFT, Action::STRAIGHT]);
        assert_eq!(input.poll_action(), Some(Action::TURN_LEFT));
        assert_eq!(input.poll_action(), Some(Action::STRAIGHT));
        assert_eq!(input.poll_action(), None);
    }
}
