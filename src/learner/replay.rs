//! Fixed-capacity replay memory.

use crate::perception::Features;
use rand::seq::index;
use rand::Rng;
use std::collections::VecDeque;

/// One recorded transition.
#[derive(Clone, Debug, PartialEq)]
pub struct Transition {
    /// The feature vector before the action.
    pub state: Features,
    /// The index of the chosen action.
    pub action: usize,
    /// The feature vector after the action, or `None` when the
    /// transition ended the episode.
    pub next: Option<Features>,
    /// The reward received.
    pub reward: f64,
}

/// A FIFO store of past transitions sampled for training.
///
/// When full, pushing evicts the oldest transition. Sampling is uniform
/// and does not remove; callers must not sample more than `len`.
pub struct ReplayMemory {
    buffer: VecDeque<Transition>,
    capacity: usize,
}

impl ReplayMemory {
    /// Creates an empty memory with the given capacity.
    pub fn new(capacity: usize) -> Self {
        Self {
            buffer: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// The number of stored transitions.
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Whether the memory holds no transitions.
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Appends a transition, evicting the oldest when at capacity.
    pub fn push(&mut self, transition: Transition) {
        if self.buffer.len() == self.capacity {
            self.buffer.pop_front();
        }
        self.buffer.push_back(transition);
    }

    /// Draws `count` distinct transitions uniformly at random.
    pub fn sample<R: Rng>(&self, count: usize, rng: &mut R) -> Vec<&Transition> {
        index::sample(rng, self.buffer.len(), count)
            .into_iter()
            .map(|i| &self.buffer[i])
            .collect()
    }

    /// Iterates the stored transitions, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &Transition> {
        self.buffer.iter()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use smallvec::smallvec;

    fn transition(tag: f64) -> Transition {
        Transition {
            state: smallvec![tag],
            action: 0,
            next: Some(smallvec![tag + 1.0]),
            reward: 0.0,
        }
    }

    #[test]
    fn eviction_keeps_the_newest_in_order() {
        let mut memory = ReplayMemory::new(5);
        for i in 0..8 {
            memory.push(transition(i as f64));
        }
        assert_eq!(memory.len(), 5);
        let tags: Vec<f64> = memory.iter().map(|t| t.state[0]).collect();
        assert_eq!(tags, vec![3.0, 4.0, 5.0, 6.0, 7.0]);
    }

    #[test]
    fn sampling_is_distinct_and_leaves_the_buffer_intact() {
        let mut memory = ReplayMemory::new(10);
        for i in 0..10 {
            memory.push(transition(i as f64));
        }
        let mut rng = StdRng::seed_from_u64(1);
        let batch = memory.sample(4, &mut rng);
        assert_eq!(batch.len(), 4);
        let mut tags: Vec<f64> = batch.iter().map(|t| t.state[0]).collect();
        tags.sort_by(f64::total_cmp);
        tags.dedup();
        assert_eq!(tags.len(), 4);
        assert_eq!(memory.len(), 10);
    }
}
