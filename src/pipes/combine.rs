//! Stages that merge several upstream pipes into one stream.

use std::collections::VecDeque;

use serde_json::Value;

use crate::errors::Result;
use crate::pipes::{take_sources, BoxedPipe, DataPipe, Sample, SampleIter};
use crate::registry::{Params, Registry};

/// Round-robin interleave over two or more upstream pipes.
///
/// Yields one sample from each upstream in turn, a full round at a time.
/// The stream ends when any upstream runs out mid-round; that partial
/// round is discarded, so every upstream contributes the same number of
/// samples (shortest-input semantics).
#[derive(Debug)]
pub struct Multiplexer {
    sources: Vec<BoxedPipe>,
}

impl Multiplexer {
    pub fn new(sources: Vec<BoxedPipe>) -> Self {
        Self { sources }
    }

    pub(crate) fn from_config(
        _registry: &Registry,
        mut params: Params<BoxedPipe>,
        inputs: Vec<BoxedPipe>,
    ) -> Result<BoxedPipe> {
        let sources = take_sources(&mut params, inputs)?;
        params.finish()?;
        Ok(Box::new(Self::new(sources)))
    }
}

impl DataPipe for Multiplexer {
    fn iter(&self) -> SampleIter<'_> {
        let mut passes: Vec<SampleIter<'_>> = self.sources.iter().map(|s| s.iter()).collect();
        let mut pending: VecDeque<Sample> = VecDeque::with_capacity(passes.len());
        let mut done = passes.is_empty();
        Box::new(std::iter::from_fn(move || {
            if pending.is_empty() && !done {
                for pass in &mut passes {
                    match pass.next() {
                        Some(sample) => pending.push_back(sample),
                        None => {
                            // A partial round is discarded, not emitted.
                            pending.clear();
                            done = true;
                            break;
                        }
                    }
                }
            }
            pending.pop_front()
        }))
    }

    fn len_hint(&self) -> Option<usize> {
        self.sources
            .iter()
            .map(|s| s.len_hint())
            .collect::<Option<Vec<_>>>()
            .and_then(|hints| hints.into_iter().min())
            .map(|shortest| shortest * self.sources.len())
    }
}

/// Element-wise combination: the i-th samples of all upstreams become one
/// `Value::Array` sample. Stops at the shortest upstream.
#[derive(Debug)]
pub struct Zipper {
    sources: Vec<BoxedPipe>,
}

impl Zipper {
    pub fn new(sources: Vec<BoxedPipe>) -> Self {
        Self { sources }
    }

    pub(crate) fn from_config(
        _registry: &Registry,
        mut params: Params<BoxedPipe>,
        inputs: Vec<BoxedPipe>,
    ) -> Result<BoxedPipe> {
        let sources = take_sources(&mut params, inputs)?;
        params.finish()?;
        Ok(Box::new(Self::new(sources)))
    }
}

impl DataPipe for Zipper {
    fn iter(&self) -> SampleIter<'_> {
        // With no upstreams the row loop below would never hit an end.
        if self.sources.is_empty() {
            return Box::new(std::iter::empty());
        }
        let mut passes: Vec<SampleIter<'_>> = self.sources.iter().map(|s| s.iter()).collect();
        Box::new(std::iter::from_fn(move || {
            let mut row = Vec::with_capacity(passes.len());
            for pass in &mut passes {
                row.push(pass.next()?);
            }
            Some(Value::Array(row))
        }))
    }

    fn len_hint(&self) -> Option<usize> {
        self.sources
            .iter()
            .map(|s| s.len_hint())
            .collect::<Option<Vec<_>>>()
            .and_then(|hints| hints.into_iter().min())
    }
}

/// Sequential concatenation: all samples of the first upstream, then all
/// of the second, and so on.
#[derive(Debug)]
pub struct Concater {
    sources: Vec<BoxedPipe>,
}

impl Concater {
    pub fn new(sources: Vec<BoxedPipe>) -> Self {
        Self { sources }
    }

    pub(crate) fn from_config(
        _registry: &Registry,
        mut params: Params<BoxedPipe>,
        inputs: Vec<BoxedPipe>,
    ) -> Result<BoxedPipe> {
        let sources = take_sources(&mut params, inputs)?;
        params.finish()?;
        Ok(Box::new(Self::new(sources)))
    }
}

impl DataPipe for Concater {
    fn iter(&self) -> SampleIter<'_> {
        Box::new(self.sources.iter().flat_map(|s| s.iter()))
    }

    fn len_hint(&self) -> Option<usize> {
        self.sources
            .iter()
            .map(|s| s.len_hint())
            .try_fold(0usize, |acc, hint| hint.map(|n| acc + n))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipes::{collect_samples, SourceWrapper};
    use serde_json::json;

    fn source(samples: Vec<Value>) -> BoxedPipe {
        Box::new(SourceWrapper::from_samples(samples))
    }

    #[test]
    fn test_multiplexer_round_robin() {
        let pipe = Multiplexer::new(vec![
            source(vec![json!(1), json!(2)]),
            source(vec![json!(11), json!(12)]),
        ]);
        assert_eq!(
            collect_samples(&pipe),
            vec![json!(1), json!(11), json!(2), json!(12)]
        );
    }

    #[test]
    fn test_multiplexer_drops_partial_round() {
        // B runs out on the second round, so that round's sample from A
        // is discarded along with it.
        let pipe = Multiplexer::new(vec![
            source(vec![json!(1), json!(2), json!(3)]),
            source(vec![json!(10)]),
        ]);
        assert_eq!(collect_samples(&pipe), vec![json!(1), json!(10)]);
    }

    #[test]
    fn test_multiplexer_len_hint_counts_full_rounds() {
        let pipe = Multiplexer::new(vec![
            source(vec![json!(1), json!(2), json!(3)]),
            source(vec![json!(10), json!(20)]),
        ]);
        assert_eq!(pipe.len_hint(), Some(4));
        assert_eq!(
            collect_samples(&pipe),
            vec![json!(1), json!(10), json!(2), json!(20)]
        );
    }

    #[test]
    fn test_multiplexer_single_source_is_passthrough() {
        let pipe = Multiplexer::new(vec![source(vec![json!(1), json!(2)])]);
        assert_eq!(collect_samples(&pipe), vec![json!(1), json!(2)]);
    }

    #[test]
    fn test_multiplexer_no_sources_is_empty() {
        let pipe = Multiplexer::new(Vec::new());
        assert!(collect_samples(&pipe).is_empty());
    }

    #[test]
    fn test_multiplexer_reiterable() {
        let pipe = Multiplexer::new(vec![
            source(vec![json!(1), json!(2)]),
            source(vec![json!(3), json!(4)]),
        ]);
        assert_eq!(collect_samples(&pipe), collect_samples(&pipe));
    }

    #[test]
    fn test_zipper_pairs_elements() {
        let pipe = Zipper::new(vec![
            source(vec![json!(1), json!(2)]),
            source(vec![json!("a"), json!("b")]),
        ]);
        assert_eq!(
            collect_samples(&pipe),
            vec![json!([1, "a"]), json!([2, "b"])]
        );
    }

    #[test]
    fn test_zipper_no_sources_is_empty() {
        let pipe = Zipper::new(Vec::new());
        assert!(collect_samples(&pipe).is_empty());
    }

    #[test]
    fn test_zipper_stops_at_shortest() {
        let pipe = Zipper::new(vec![
            source(vec![json!(1), json!(2), json!(3)]),
            source(vec![json!("a")]),
        ]);
        assert_eq!(collect_samples(&pipe), vec![json!([1, "a"])]);
        assert_eq!(pipe.len_hint(), Some(1));
    }

    #[test]
    fn test_concater_chains_sources() {
        let pipe = Concater::new(vec![
            source(vec![json!(1), json!(2)]),
            source(vec![json!(3)]),
        ]);
        assert_eq!(
            collect_samples(&pipe),
            vec![json!(1), json!(2), json!(3)]
        );
        assert_eq!(pipe.len_hint(), Some(3));
    }
}
