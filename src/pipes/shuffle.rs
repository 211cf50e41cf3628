//! Buffered shuffling.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::errors::Result;
use crate::pipes::{take_source, BoxedPipe, DataPipe, Sample, SampleIter};
use crate::registry::{Params, Registry};

/// Default shuffle buffer capacity.
pub const DEFAULT_BUFFER_SIZE: usize = 1000;

/// Shuffles an upstream pipe through a bounded buffer.
///
/// Samples fill a buffer of `buffer_size`; once full, each incoming
/// sample evicts (and yields) a uniformly chosen buffered one, and the
/// remainder drains in random order at the end. A buffer at least as
/// large as the upstream gives a full uniform shuffle.
///
/// A seeded shuffler replays the same permutation on every pass; an
/// unseeded one draws fresh entropy per pass.
#[derive(Debug)]
pub struct Shuffler {
    source: BoxedPipe,
    buffer_size: usize,
    seed: Option<u64>,
}

impl Shuffler {
    pub fn new(source: BoxedPipe) -> Self {
        Self {
            source,
            buffer_size: DEFAULT_BUFFER_SIZE,
            seed: None,
        }
    }

    /// Buffer capacity (must be ≥ 1).
    pub fn buffer_size(mut self, buffer_size: usize) -> Self {
        debug_assert!(buffer_size >= 1, "buffer_size must be >= 1");
        self.buffer_size = buffer_size;
        self
    }

    /// Fix the shuffle order across passes.
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub(crate) fn from_config(
        _registry: &Registry,
        mut params: Params<BoxedPipe>,
        inputs: Vec<BoxedPipe>,
    ) -> Result<BoxedPipe> {
        let source = take_source(&mut params, inputs)?;
        let buffer_size: usize = params.take("buffer_size")?.unwrap_or(DEFAULT_BUFFER_SIZE);
        if buffer_size == 0 {
            return Err(params.invalid("buffer_size", "must be at least 1"));
        }
        let seed: Option<u64> = params.take("seed")?;
        params.finish()?;

        let mut shuffler = Self::new(source).buffer_size(buffer_size);
        if let Some(seed) = seed {
            shuffler = shuffler.seed(seed);
        }
        Ok(Box::new(shuffler))
    }

    fn pass_rng(&self) -> StdRng {
        match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        }
    }
}

impl DataPipe for Shuffler {
    fn iter(&self) -> SampleIter<'_> {
        let mut upstream = self.source.iter();
        let mut rng = self.pass_rng();
        let capacity = self.buffer_size;
        let mut buffer: Vec<Sample> = Vec::with_capacity(capacity.min(1024));
        Box::new(std::iter::from_fn(move || loop {
            match upstream.next() {
                Some(sample) if buffer.len() < capacity => buffer.push(sample),
                Some(sample) => {
                    let slot = rng.gen_range(0..buffer.len());
                    return Some(std::mem::replace(&mut buffer[slot], sample));
                }
                None => {
                    if buffer.is_empty() {
                        return None;
                    }
                    let slot = rng.gen_range(0..buffer.len());
                    return Some(buffer.swap_remove(slot));
                }
            }
        }))
    }

    fn len_hint(&self) -> Option<usize> {
        self.source.len_hint()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipes::{collect_samples, SourceWrapper};
    use serde_json::Value;

    fn source(n: i64) -> BoxedPipe {
        Box::new(SourceWrapper::from_samples(
            (0..n).map(Value::from).collect(),
        ))
    }

    fn sorted(mut samples: Vec<Value>) -> Vec<Value> {
        samples.sort_by_key(|v| v.as_i64());
        samples
    }

    #[test]
    fn test_shuffle_preserves_samples() {
        let pipe = Shuffler::new(source(20)).buffer_size(4).seed(1);
        let shuffled = collect_samples(&pipe);
        assert_eq!(sorted(shuffled), collect_samples(&source(20)));
    }

    #[test]
    fn test_seeded_shuffle_repeats_per_pass() {
        let pipe = Shuffler::new(source(50)).buffer_size(8).seed(17);
        assert_eq!(collect_samples(&pipe), collect_samples(&pipe));
    }

    #[test]
    fn test_different_seeds_differ() {
        let a = Shuffler::new(source(50)).buffer_size(50).seed(1);
        let b = Shuffler::new(source(50)).buffer_size(50).seed(2);
        assert_ne!(collect_samples(&a), collect_samples(&b));
    }

    #[test]
    fn test_full_buffer_permutes() {
        // With the buffer covering the whole input, some displacement is
        // all but certain for 50 elements.
        let pipe = Shuffler::new(source(50)).seed(5);
        let shuffled = collect_samples(&pipe);
        assert_ne!(shuffled, collect_samples(&source(50)));
        assert_eq!(shuffled.len(), 50);
    }

    #[test]
    fn test_empty_upstream() {
        let pipe = Shuffler::new(source(0)).seed(9);
        assert!(collect_samples(&pipe).is_empty());
    }

    #[test]
    fn test_len_hint_passthrough() {
        let pipe = Shuffler::new(source(7));
        assert_eq!(pipe.len_hint(), Some(7));
    }
}
