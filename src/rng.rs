//! Seeded randomness, one ChaCha8 stream per consumer.
//!
//! Every stream is keyed by the scenario seed and its ChaCha stream number,
//! so a stream's sequence never depends on which other streams exist or the
//! order they are first drawn from. Adding a consumer leaves existing runs
//! reproducible.

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamId {
    Wind,
    Greenkeeper,
    Shots,
    Spawn,
}

impl StreamId {
    pub const ALL: [StreamId; 4] = [
        StreamId::Wind,
        StreamId::Greenkeeper,
        StreamId::Shots,
        StreamId::Spawn,
    ];

    fn index(self) -> usize {
        match self {
            StreamId::Wind => 0,
            StreamId::Greenkeeper => 1,
            StreamId::Shots => 2,
            StreamId::Spawn => 3,
        }
    }
}

pub struct RngManager {
    seed: u64,
    streams: [ChaCha8Rng; 4],
}

impl RngManager {
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            streams: StreamId::ALL.map(|id| Self::fresh(seed, id)),
        }
    }

    fn fresh(seed: u64, id: StreamId) -> ChaCha8Rng {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        rng.set_stream(id.index() as u64);
        rng
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn stream(&mut self, id: StreamId) -> &mut ChaCha8Rng {
        &mut self.streams[id.index()]
    }
}
