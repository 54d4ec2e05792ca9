//! Grid simulation: snake movement, food, collisions and rewards.

use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};
use tracing::{trace, warn};

use crate::border::Border;
use crate::config::{ActionSet, GameConfig};
use crate::error::ConfigError;
use crate::food::Food;
use crate::snake::{Direction, Snake};
use crate::utils::Point;

pub const REWARD_FOOD: f32 = 10.0;
pub const REWARD_DEATH: f32 = -10.0;
pub const REWARD_STEP: f32 = 0.0;

const INITIAL_LENGTH: usize = 3;

/// Index into the configured action set.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Action(pub usize);

impl Action {
    /// Relative set: keep heading.
    pub const STRAIGHT: Action = Action(0);
    /// Relative set: 90° clockwise.
    pub const TURN_RIGHT: Action = Action(1);
    /// Relative set: 90° counter-clockwise.
    pub const TURN_LEFT: Action = Action(2);

    /// Absolute set: the index of a compass direction.
    pub fn toward(dir: Direction) -> Action {
        Action(dir.index())
    }

    pub fn one_hot(&self, n: usize) -> Vec<f32> {
        let mut v = vec![0.0; n];
        if self.0 < n {
            v[self.0] = 1.0;
        }
        v
    }

    /// Inverse of [`Action::one_hot`]: the single hot index, if exactly one.
    pub fn from_one_hot(v: &[f32]) -> Option<Action> {
        let mut hot = v.iter().enumerate().filter(|(_, x)| **x == 1.0);
        match (hot.next(), hot.next()) {
            (Some((i, _)), None) if v.iter().all(|x| *x == 0.0 || *x == 1.0) => Some(Action(i)),
            _ => None,
        }
    }
}

/// Why an episode ended.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EpisodeEnd {
    Wall,
    SelfCollision,
    Stalled,
    /// Food could not be placed because the board is full.
    Starved,
}

impl EpisodeEnd {
    pub fn as_str(&self) -> &'static str {
        match self {
            EpisodeEnd::Wall => "wall",
            EpisodeEnd::SelfCollision => "self_collision",
            EpisodeEnd::Stalled => "stalled",
            EpisodeEnd::Starved => "starved",
        }
    }
}

/// Result of a single `GridWorld::step`.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct StepOutcome {
    pub reward: f32,
    pub done: bool,
    pub score: u32,
    pub end: Option<EpisodeEnd>,
}

/// Read-only snapshot of the world, handed to encoders and renderers.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorldState {
    /// Head first.
    pub snake: Vec<Point>,
    pub direction: Direction,
    pub food: Point,
    pub score: u32,
    /// Steps since the last reset.
    pub steps: usize,
    pub width: i32,
    pub height: i32,
    pub cell: i32,
}

impl WorldState {
    pub fn head(&self) -> Point {
        self.snake[0]
    }

    pub fn border(&self) -> Border {
        Border { width: self.width, height: self.height, cell: self.cell }
    }

    /// Whether the head moving onto `p` would end the episode.
    pub fn is_collision(&self, p: Point) -> bool {
        !self.border().is_inside(p) || self.snake.iter().skip(1).any(|&s| s == p)
    }
}

pub struct GridWorld {
    config: GameConfig,
    border: Border,
    snake: Snake,
    food: Food,
    score: u32,
    steps: usize,
    over: bool,
    rng: StdRng,
}

impl GridWorld {
    pub fn new(config: GameConfig) -> Result<Self, ConfigError> {
        let border = config.board()?;
        let rng = StdRng::seed_from_u64(config.seed);
        let snake = Snake::new(border.center(), INITIAL_LENGTH, Direction::Right, border.cell);
        let mut world = Self {
            food: Food::at(Point::new(0, 0)),
            config,
            border,
            snake,
            score: 0,
            steps: 0,
            over: false,
            rng,
        };
        world.reset();
        Ok(world)
    }

    /// World in an exact, caller-chosen position.
    pub fn from_parts(
        config: GameConfig,
        snake: Vec<Point>,
        direction: Direction,
        food: Point,
    ) -> Result<Self, ConfigError> {
        let border = config.board()?;
        if snake.is_empty() {
            return Err(ConfigError::Invalid("snake needs at least one segment".into()));
        }
        let rng = StdRng::seed_from_u64(config.seed);
        Ok(Self {
            config,
            border,
            snake: Snake::from_segments(snake, direction),
            food: Food::at(food),
            score: 0,
            steps: 0,
            over: false,
            rng,
        })
    }

    /// Fresh 3-segment snake at the centre, random heading, new food, score 0.
    pub fn reset(&mut self) -> WorldState {
        let direction = Direction::random(&mut self.rng);
        self.snake = Snake::new(self.border.center(), INITIAL_LENGTH, direction, self.border.cell);
        self.food = Food::spawn(&mut self.rng, &self.border, &self.snake)
            .unwrap_or_else(|e| unreachable!("fresh snake cannot fill a validated board: {e}"));
        self.score = 0;
        self.steps = 0;
        self.over = false;
        self.state()
    }

    pub fn step(&mut self, action: Action) -> StepOutcome {
        if self.over {
            return StepOutcome { reward: 0.0, done: true, score: self.score, end: None };
        }
        self.steps += 1;

        let direction = self.resolve(action);
        self.snake.direction = direction;
        let new_head = self.snake.head().offset(direction.delta(), self.border.cell);
        self.snake.push_head(new_head);

        if !self.border.is_inside(new_head) {
            return self.finish(EpisodeEnd::Wall);
        }
        if self.snake.hits_body(new_head) {
            return self.finish(EpisodeEnd::SelfCollision);
        }
        if self.steps > self.config.stall_factor.saturating_mul(self.snake.len()) {
            return self.finish(EpisodeEnd::Stalled);
        }

        if new_head == self.food.position {
            self.score += 1;
            if let Err(e) = self.food.respawn(&mut self.rng, &self.border, &self.snake) {
                warn!(score = self.score, "{e}; ending episode");
                return self.finish(EpisodeEnd::Starved);
            }
            return StepOutcome { reward: REWARD_FOOD, done: false, score: self.score, end: None };
        }

        self.snake.pop_tail();
        StepOutcome { reward: REWARD_STEP, done: false, score: self.score, end: None }
    }

    /// New heading for `action`; reversals into the neck keep the old heading.
    fn resolve(&self, action: Action) -> Direction {
        let current = self.snake.direction;
        match self.config.action_set {
            ActionSet::Relative => match action {
                Action::STRAIGHT => current,
                Action::TURN_RIGHT => current.right(),
                Action::TURN_LEFT => current.left(),
                Action(other) => {
                    trace!(action = other, "unknown relative action ignored");
                    current
                }
            },
            ActionSet::Absolute => match Direction::ALL.get(action.0) {
                Some(&d) if d == current.opposite() => {
                    trace!(?current, requested = ?d, "reversal ignored");
                    current
                }
                Some(&d) => d,
                None => {
                    trace!(action = action.0, "unknown absolute action ignored");
                    current
                }
            },
        }
    }

    fn finish(&mut self, end: EpisodeEnd) -> StepOutcome {
        self.over = true;
        StepOutcome { reward: REWARD_DEATH, done: true, score: self.score, end: Some(end) }
    }

    pub fn state(&self) -> WorldState {
        WorldState {
            snake: self.snake.to_vec(),
            direction: self.snake.direction,
            food: self.food.position,
            score: self.score,
            steps: self.steps,
            width: self.border.width,
            height: self.border.height,
            cell: self.border.cell,
        }
    }

    pub fn is_over(&self) -> bool {
        self.over
    }

    pub fn score(&self) -> u32 {
        self.score
    }

    pub fn snake(&self) -> &Snake {
        &self.snake
    }

    pub fn food(&self) -> Point {
        self.food.position
    }

    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    pub fn action_count(&self) -> usize {
        self.config.action_set.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(action_set: ActionSet) -> GameConfig {
        GameConfig { width: 600, height: 400, cell_size: 20, action_set, ..GameConfig::default() }
    }

    fn scenario(action_set: ActionSet) -> GridWorld {
        GridWorld::from_parts(
            config(action_set),
            vec![Point::new(300, 200), Point::new(280, 200), Point::new(260, 200)],
            Direction::Right,
            Point::new(320, 200),
        )
        .unwrap()
    }

    #[test]
    fn eating_food_grows_and_respawns() {
        let mut world = scenario(ActionSet::Relative);
        let out = world.step(Action::STRAIGHT);
        assert_eq!(out.reward, REWARD_FOOD);
        assert!(!out.done);
        assert_eq!(out.score, 1);
        let state = world.state();
        assert_eq!(state.snake.len(), 4);
        assert_eq!(state.head(), Point::new(320, 200));
        assert!(!state.snake.contains(&state.food));
        assert!(state.border().is_inside(state.food));
    }

    #[test]
    fn leaving_the_board_is_fatal() {
        let mut world = GridWorld::from_parts(
            config(ActionSet::Relative),
            vec![Point::new(0, 200), Point::new(20, 200), Point::new(40, 200)],
            Direction::Left,
            Point::new(300, 100),
        )
        .unwrap();
        let out = world.step(Action::STRAIGHT);
        assert_eq!(out.reward, REWARD_DEATH);
        assert!(out.done);
        assert_eq!(out.score, 0);
        assert_eq!(out.end, Some(EpisodeEnd::Wall));
        // head pushed, tail kept
        assert_eq!(world.state().snake[0], Point::new(-20, 200));
        assert_eq!(world.state().snake.len(), 4);
        assert!(world.is_over());
    }

    #[test]
    fn plain_move_keeps_length() {
        let mut world = scenario(ActionSet::Relative);
        let out = world.step(Action::TURN_RIGHT);
        assert_eq!(out.reward, REWARD_STEP);
        assert_eq!(world.state().snake.len(), 3);
        assert_eq!(world.state().direction, Direction::Down);
        assert_eq!(world.state().head(), Point::new(300, 220));
    }

    #[test]
    fn absolute_reversal_is_ignored() {
        let mut world = scenario(ActionSet::Absolute);
        let out = world.step(Action::toward(Direction::Left));
        assert!(!out.done);
        assert_eq!(world.state().direction, Direction::Right);
        assert_eq!(world.state().head(), Point::new(320, 200));
    }

    #[test]
    fn running_into_body_is_fatal() {
        // head at (300,200) heading left; turning left points it down into the body
        let body = vec![
            Point::new(300, 200),
            Point::new(320, 200),
            Point::new(320, 220),
            Point::new(300, 220),
            Point::new(280, 220),
        ];
        let mut world =
            GridWorld::from_parts(config(ActionSet::Relative), body, Direction::Left, Point::new(0, 0)).unwrap();
        let out = world.step(Action::TURN_LEFT);
        assert!(out.done);
        assert_eq!(out.end, Some(EpisodeEnd::SelfCollision));
        assert_eq!(out.reward, REWARD_DEATH);
    }

    #[test]
    fn stalling_ends_the_episode() {
        let mut cfg = config(ActionSet::Relative);
        cfg.stall_factor = 1;
        let mut world = GridWorld::from_parts(
            cfg,
            vec![Point::new(300, 200), Point::new(280, 200), Point::new(260, 200)],
            Direction::Right,
            Point::new(0, 0),
        )
        .unwrap();
        // length is 4 once the head is pushed, so step 5 is the first over the limit
        let outs: Vec<_> = (0..5).map(|_| world.step(Action::TURN_RIGHT)).collect();
        assert!(outs[..4].iter().all(|o| !o.done));
        assert_eq!(outs[4].end, Some(EpisodeEnd::Stalled));
        assert_eq!(outs[4].reward, REWARD_DEATH);
    }

    #[test]
    fn filling_the_board_starves() {
        // 5x5 board, snake covers all but the food cell
        let cfg = GameConfig { width: 100, height: 100, cell_size: 20, action_set: ActionSet::Relative, ..GameConfig::default() };
        let border = Border::new(100, 100, 20).unwrap();
        // serpentine path through every cell; the last cell holds the food
        let mut path = Vec::new();
        for r in 0..5 {
            let cols: Vec<i32> = if r % 2 == 0 { (0..5).collect() } else { (0..5).rev().collect() };
            for c in cols {
                path.push(Point::new(c * 20, r * 20));
            }
        }
        let food = *path.last().unwrap();
        let mut body: Vec<Point> = path[..path.len() - 1].to_vec();
        body.reverse();
        assert_eq!(body[0], Point::new(60, 80));
        assert!(border.cells().all(|p| body.contains(&p) || p == food));
        let mut world = GridWorld::from_parts(cfg, body, Direction::Right, food).unwrap();
        let out = world.step(Action::STRAIGHT);
        assert!(out.done);
        assert_eq!(out.end, Some(EpisodeEnd::Starved));
        assert_eq!(out.reward, REWARD_DEATH);
        assert_eq!(out.score, 1);
    }

    #[test]
    fn reset_gives_centred_three_segment_snake() {
        let mut world = GridWorld::new(config(ActionSet::Absolute)).unwrap();
        for _ in 0..20 {
            let s = world.reset();
            assert_eq!(s.snake.len(), 3);
            assert_eq!(s.head(), Point::new(300, 200));
            assert_eq!(s.score, 0);
            assert_eq!(s.steps, 0);
            assert!(!s.snake.contains(&s.food));
            let tail = s.direction.opposite().delta();
            assert_eq!(s.snake[1], s.head().offset(tail, 20));
        }
    }

    #[test]
    fn snake_never_shorter_than_three_before_death() {
        let mut world = GridWorld::new(config(ActionSet::Relative)).unwrap();
        for i in 0..500 {
            let out = world.step(Action(i % 3));
            if out.done {
                world.reset();
            } else {
                assert!(world.state().snake.len() >= 3);
            }
        }
    }

    #[test]
    fn one_hot_round_trip() {
        let a = Action(2);
        assert_eq!(a.one_hot(3), vec![0.0, 0.0, 1.0]);
        assert_eq!(Action::from_one_hot(&a.one_hot(3)), Some(a));
        assert_eq!(Action::from_one_hot(&[1.0, 1.0, 0.0]), None);
        assert_eq!(Action::from_one_hot(&[0.0, 0.0, 0.0]), None);
    }

    #[test]
    fn rejects_tiny_board() {
        let cfg = GameConfig { width: 60, height: 400, ..GameConfig::default() };
        assert!(GridWorld::new(cfg).is_err());
    }
}
