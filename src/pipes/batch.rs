//! Batching stages.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde_json::{Map, Value};

use crate::errors::Result;
use crate::pipes::{take_source, BoxedPipe, DataPipe, Sample, SampleIter};
use crate::registry::{Params, Registry};

/// Groups consecutive upstream samples into `Value::Array` batches.
///
/// The final batch may be smaller than `batch_size`; set `drop_last` to
/// discard it instead.
#[derive(Debug)]
pub struct Batcher {
    source: BoxedPipe,
    batch_size: usize,
    drop_last: bool,
}

impl Batcher {
    /// Batch `source` into groups of `batch_size` (must be ≥ 1).
    pub fn new(source: BoxedPipe, batch_size: usize) -> Self {
        debug_assert!(batch_size >= 1, "batch_size must be >= 1");
        Self {
            source,
            batch_size,
            drop_last: false,
        }
    }

    /// Discard a trailing partial batch.
    pub fn drop_last(mut self, drop_last: bool) -> Self {
        self.drop_last = drop_last;
        self
    }

    pub(crate) fn from_config(
        _registry: &Registry,
        mut params: Params<BoxedPipe>,
        inputs: Vec<BoxedPipe>,
    ) -> Result<BoxedPipe> {
        let source = take_source(&mut params, inputs)?;
        let batch_size: usize = params.require("batch_size")?;
        if batch_size == 0 {
            return Err(params.invalid("batch_size", "must be at least 1"));
        }
        let drop_last = params.take("drop_last")?.unwrap_or(false);
        params.finish()?;
        Ok(Box::new(Self::new(source, batch_size).drop_last(drop_last)))
    }
}

impl DataPipe for Batcher {
    fn iter(&self) -> SampleIter<'_> {
        let mut upstream = self.source.iter();
        let batch_size = self.batch_size;
        let drop_last = self.drop_last;
        Box::new(std::iter::from_fn(move || {
            let mut batch = Vec::with_capacity(batch_size);
            for _ in 0..batch_size {
                match upstream.next() {
                    Some(sample) => batch.push(sample),
                    None => break,
                }
            }
            if batch.is_empty() || (drop_last && batch.len() < batch_size) {
                None
            } else {
                Some(Value::Array(batch))
            }
        }))
    }

    fn len_hint(&self) -> Option<usize> {
        self.source.len_hint().map(|n| {
            if self.drop_last {
                n / self.batch_size
            } else {
                n.div_ceil(self.batch_size)
            }
        })
    }
}

/// Slices an object-of-arrays into consecutive object-of-array batches.
///
/// The input is a mapping whose values are equally long arrays (one per
/// column); the output is one mapping per batch, each column holding that
/// batch's rows. Ragged columns truncate to the shortest; objects with a
/// non-array column yield nothing. With `shuffle`, one row permutation is
/// applied coherently across all columns (seeded permutations repeat per
/// pass, unseeded ones draw fresh entropy).
///
/// The columnar data comes from a static `data` parameter or, when fed
/// from an upstream pipe, from each upstream mapping sample in turn
/// (non-mapping samples are skipped).
#[derive(Debug)]
pub struct DictBatcher {
    input: DictInput,
    batch_size: usize,
    shuffle: bool,
    seed: Option<u64>,
}

#[derive(Debug)]
enum DictInput {
    Data(Map<String, Value>),
    Upstream(BoxedPipe),
}

impl DictBatcher {
    /// Batch a static object-of-arrays.
    pub fn from_data(data: Map<String, Value>, batch_size: usize) -> Self {
        debug_assert!(batch_size >= 1, "batch_size must be >= 1");
        Self {
            input: DictInput::Data(data),
            batch_size,
            shuffle: false,
            seed: None,
        }
    }

    /// Batch each object-of-arrays sample of an upstream pipe.
    pub fn from_pipe(source: BoxedPipe, batch_size: usize) -> Self {
        debug_assert!(batch_size >= 1, "batch_size must be >= 1");
        Self {
            input: DictInput::Upstream(source),
            batch_size,
            shuffle: false,
            seed: None,
        }
    }

    /// Permute rows before slicing.
    pub fn shuffle(mut self, shuffle: bool) -> Self {
        self.shuffle = shuffle;
        self
    }

    /// Fix the shuffle permutation.
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub(crate) fn from_config(
        _registry: &Registry,
        mut params: Params<BoxedPipe>,
        inputs: Vec<BoxedPipe>,
    ) -> Result<BoxedPipe> {
        let data: Option<Map<String, Value>> = params.take("data")?;
        let batch_size: usize = params.require("batch_size")?;
        if batch_size == 0 {
            return Err(params.invalid("batch_size", "must be at least 1"));
        }
        let shuffle = params.take("shuffle")?.unwrap_or(false);
        let seed: Option<u64> = params.take("seed")?;

        let mut batcher = match data {
            Some(_) if !inputs.is_empty() => {
                return Err(params.invalid(
                    "data",
                    "got both a 'data' parameter and a positional input",
                ))
            }
            Some(columns) => Self::from_data(columns, batch_size),
            None => Self::from_pipe(take_source(&mut params, inputs)?, batch_size),
        };
        batcher = batcher.shuffle(shuffle);
        if let Some(seed) = seed {
            batcher = batcher.seed(seed);
        }
        params.finish()?;
        Ok(Box::new(batcher))
    }

    /// Slice one columnar object into batches.
    fn slice_object(&self, columns: &Map<String, Value>, out: &mut Vec<Sample>) {
        let num_rows = columns
            .values()
            .map(|column| column.as_array().map_or(0, Vec::len))
            .min()
            .unwrap_or(0);
        if num_rows == 0 {
            return;
        }

        let mut order: Vec<usize> = (0..num_rows).collect();
        if self.shuffle {
            let mut rng = match self.seed {
                Some(seed) => StdRng::seed_from_u64(seed),
                None => StdRng::from_entropy(),
            };
            order.shuffle(&mut rng);
        }

        let mut start = 0;
        while start < num_rows {
            let end = (start + self.batch_size).min(num_rows);
            let mut batch = Map::with_capacity(columns.len());
            for (key, column) in columns {
                // min() above guarantees every column indexes in range.
                let rows = column.as_array().map_or(&[][..], Vec::as_slice);
                let picked: Vec<Value> =
                    order[start..end].iter().map(|&i| rows[i].clone()).collect();
                batch.insert(key.clone(), Value::Array(picked));
            }
            out.push(Value::Object(batch));
            start = end;
        }
    }
}

impl DataPipe for DictBatcher {
    fn iter(&self) -> SampleIter<'_> {
        let mut batches = Vec::new();
        match &self.input {
            DictInput::Data(columns) => self.slice_object(columns, &mut batches),
            DictInput::Upstream(pipe) => {
                for sample in pipe.iter() {
                    if let Value::Object(columns) = sample {
                        self.slice_object(&columns, &mut batches);
                    }
                }
            }
        }
        Box::new(batches.into_iter())
    }
}
