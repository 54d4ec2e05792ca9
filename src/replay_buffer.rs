use std::collections::VecDeque;

use rand::Rng;

use crate::error::BufferError;
use crate::game::Action;

/// A single experience tuple (s, a, r, s', done). Never mutated once stored.
#[derive(Clone, Debug, PartialEq)]
pub struct Transition<S> {
    pub state: S,
    pub action: Action,
    pub reward: f32,
    pub next_state: S,
    pub done: bool,
}

/// Fixed-capacity FIFO of transitions; the oldest entry is evicted first.
#[derive(Debug)]
pub struct ReplayBuffer<S> {
    buffer: VecDeque<Transition<S>>,
    capacity: usize,
}

impl<S> ReplayBuffer<S> {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self { buffer: VecDeque::with_capacity(capacity), capacity }
    }

    pub fn push(&mut self, transition: Transition<S>) {
        if self.buffer.len() == self.capacity {
            self.buffer.pop_front();
        }
        self.buffer.push_back(transition);
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// At least `batch_size` transitions stored.
    pub fn is_ready(&self, batch_size: usize) -> bool {
        self.buffer.len() >= batch_size
    }

    /// Most recently pushed transition.
    pub fn latest(&self) -> Option<&Transition<S>> {
        self.buffer.back()
    }

    /// Oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &Transition<S>> {
        self.buffer.iter()
    }

    /// `batch_size` uniform draws with replacement.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R, batch_size: usize) -> Result<Vec<&Transition<S>>, BufferError> {
        if batch_size > self.buffer.len() {
            return Err(BufferError::InsufficientData { requested: batch_size, available: self.buffer.len() });
        }
        Ok((0..batch_size).map(|_| &self.buffer[rng.gen_range(0..self.buffer.len())]).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn tr(i: usize) -> Transition<usize> {
        Transition { state: i, action: Action(0), reward: i as f32, next_state: i + 1, done: false }
    }

    #[test]
    fn evicts_oldest_first() {
        let mut buf = ReplayBuffer::new(5);
        for i in 0..8 {
            buf.push(tr(i));
            assert!(buf.len() <= 5);
        }
        assert_eq!(buf.len(), 5);
        let kept: Vec<usize> = buf.iter().map(|t| t.state).collect();
        assert_eq!(kept, vec![3, 4, 5, 6, 7]);
        assert_eq!(buf.latest().map(|t| t.state), Some(7));
    }

    #[test]
    fn sample_requires_enough_data() {
        let mut buf = ReplayBuffer::new(10);
        buf.push(tr(0));
        buf.push(tr(1));
        let mut rng = StdRng::seed_from_u64(0);
        assert_eq!(
            buf.sample(&mut rng, 3).unwrap_err(),
            BufferError::InsufficientData { requested: 3, available: 2 }
        );
        assert!(!buf.is_ready(3));
        assert!(buf.is_ready(2));
    }

    #[test]
    fn sample_draws_stored_transitions() {
        let mut buf = ReplayBuffer::new(4);
        for i in 0..10 {
            buf.push(tr(i));
        }
        let mut rng = StdRng::seed_from_u64(9);
        let batch = buf.sample(&mut rng, 4).unwrap();
        assert_eq!(batch.len(), 4);
        assert!(batch.iter().all(|t| (6..10).contains(&t.state)));
        // every stored item eventually shows up
        let mut seen = [false; 10];
        for _ in 0..200 {
            for t in buf.sample(&mut rng, 2).unwrap() {
                seen[t.state] = true;
            }
        }
        assert!(seen[6..].iter().all(|s| *s));
    }
}
