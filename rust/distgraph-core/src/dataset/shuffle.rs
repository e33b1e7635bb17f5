// rust/distgraph-core/src/dataset/shuffle.rs

use std::iter::FusedIterator;

use rand::rngs::StdRng;
use rand::seq::{index, SliceRandom};

use crate::error::{GraphError, Result};

enum Stage<T> {
    /// Pulling from the source, swapping elements through the buffer.
    Streaming,
    /// Source exhausted; emitting the shuffled remainder.
    Draining(std::vec::IntoIter<T>),
    Done,
}

/// Bounded-memory shuffle over a stream of batches.
///
/// Incoming batches fill a buffer until it holds `shuffle_size` elements.
/// From then on every full batch is answered with a batch of the same size
/// drawn from random buffer positions, and the incoming elements take over
/// those positions. When the source ends the buffer is shuffled and emitted
/// in `batch_size` chunks, the last one possibly shorter.
///
/// Short batches (the tail of a shard) are absorbed into the buffer rather
/// than swapped, so only the very last emitted batch can be short. Every
/// element that enters is emitted exactly once. The stream is consumed as it
/// goes and cannot be restarted.
pub struct StreamShuffleBuffer<I, T> {
    source: I,
    buffer: Vec<T>,
    batch_size: usize,
    shuffle_size: usize,
    rng: StdRng,
    stage: Stage<T>,
}

impl<I, T> StreamShuffleBuffer<I, T>
where
    I: Iterator<Item = Result<Vec<T>>>,
{
    /// Wrap a batch stream.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if `batch_size` or `shuffle_size` is zero.
    pub fn new(source: I, batch_size: usize, shuffle_size: usize, rng: StdRng) -> Result<Self> {
        if batch_size == 0 {
            return Err(GraphError::config("batch_size must be greater than 0"));
        }
        if shuffle_size == 0 {
            return Err(GraphError::config("shuffle_size must be greater than 0"));
        }
        Ok(Self {
            source,
            buffer: Vec::with_capacity(shuffle_size.min(1 << 16)),
            batch_size,
            shuffle_size,
            rng,
            stage: Stage::Streaming,
        })
    }

    /// Elements currently held back in the buffer.
    pub fn buffered(&self) -> usize {
        match &self.stage {
            Stage::Streaming => self.buffer.len(),
            Stage::Draining(rest) => rest.len(),
            Stage::Done => 0,
        }
    }

    fn swap_out(&mut self, incoming: Vec<T>) -> Vec<T> {
        let positions = index::sample(&mut self.rng, self.buffer.len(), incoming.len());
        positions
            .into_iter()
            .zip(incoming)
            .map(|(pos, element)| std::mem::replace(&mut self.buffer[pos], element))
            .collect()
    }
}

impl<I, T> Iterator for StreamShuffleBuffer<I, T>
where
    I: Iterator<Item = Result<Vec<T>>>,
{
    type Item = Result<Vec<T>>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            match &mut self.stage {
                Stage::Streaming => match self.source.next() {
                    Some(Ok(batch)) => {
                        if batch.is_empty() {
                            continue;
                        }
                        if self.buffer.len() < self.shuffle_size
                            || batch.len() < self.batch_size
                            || batch.len() > self.buffer.len()
                        {
                            self.buffer.extend(batch);
                            continue;
                        }
                        return Some(Ok(self.swap_out(batch)));
                    }
                    Some(Err(e)) => {
                        self.buffer.clear();
                        self.stage = Stage::Done;
                        return Some(Err(e));
                    }
                    None => {
                        let mut rest = std::mem::take(&mut self.buffer);
                        rest.shuffle(&mut self.rng);
                        self.stage = Stage::Draining(rest.into_iter());
                    }
                },
                Stage::Draining(rest) => {
                    let batch: Vec<T> = rest.by_ref().take(self.batch_size).collect();
                    if batch.is_empty() {
                        self.stage = Stage::Done;
                        return None;
                    }
                    return Some(Ok(batch));
                }
                Stage::Done => return None,
            }
        }
    }
}

impl<I, T> FusedIterator for StreamShuffleBuffer<I, T> where I: Iterator<Item = Result<Vec<T>>> {}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn batches(values: &[u64], batch_size: usize) -> Vec<Result<Vec<u64>>> {
        values.chunks(batch_size).map(|c| Ok(c.to_vec())).collect()
    }

    fn shuffle(
        values: &[u64],
        batch_size: usize,
        shuffle_size: usize,
        seed: u64,
    ) -> Vec<Vec<u64>> {
        let source = batches(values, batch_size).into_iter();
        StreamShuffleBuffer::new(source, batch_size, shuffle_size, StdRng::seed_from_u64(seed))
            .unwrap()
            .map(|batch| batch.unwrap())
            .collect()
    }

    fn sorted(batches: &[Vec<u64>]) -> Vec<u64> {
        let mut all: Vec<u64> = batches.iter().flatten().copied().collect();
        all.sort();
        all
    }

    #[test]
    fn test_small_stream_example() {
        // shuffle_size=3, batch_size=2, input [1,2],[3,4],[5,6],[7]
        let output = shuffle(&[1, 2, 3, 4, 5, 6, 7], 2, 3, 11);

        assert_eq!(output.iter().map(Vec::len).sum::<usize>(), 7);
        assert_eq!(sorted(&output), vec![1, 2, 3, 4, 5, 6, 7]);
    }

    #[test]
    fn test_completeness_across_sizes() {
        let values: Vec<u64> = (0..257).collect();
        for batch_size in [1, 3, 16, 64] {
            for shuffle_size in [1, 5, 100, 10_000] {
                let output = shuffle(&values, batch_size, shuffle_size, 3);
                assert_eq!(
                    sorted(&output),
                    values,
                    "batch_size={batch_size} shuffle_size={shuffle_size}"
                );
            }
        }
    }

    #[test]
    fn test_batch_size_fidelity() {
        let values: Vec<u64> = (0..1003).collect();
        for shuffle_size in [1, 10, 100, 5000] {
            let output = shuffle(&values, 8, shuffle_size, 5);
            let (last, rest) = output.split_last().unwrap();
            assert!(rest.iter().all(|b| b.len() == 8), "shuffle_size={shuffle_size}");
            assert!(!last.is_empty() && last.len() <= 8);
        }
    }

    #[test]
    fn test_stream_smaller_than_buffer_is_flushed() {
        let values: Vec<u64> = (0..10).collect();
        let output = shuffle(&values, 4, 1000, 9);
        assert_eq!(output.iter().map(Vec::len).collect::<Vec<_>>(), vec![4, 4, 2]);
        assert_eq!(sorted(&output), values);
    }

    #[test]
    fn test_output_is_shuffled() {
        let values: Vec<u64> = (0..500).collect();
        let output: Vec<u64> = shuffle(&values, 10, 50, 1).into_iter().flatten().collect();
        assert_ne!(output, values);
    }

    #[test]
    fn test_seeded_runs_are_reproducible() {
        let values: Vec<u64> = (0..200).collect();
        assert_eq!(shuffle(&values, 7, 30, 42), shuffle(&values, 7, 30, 42));
    }

    #[test]
    fn test_empty_source() {
        assert!(shuffle(&[], 4, 10, 0).is_empty());
    }

    #[test]
    fn test_memory_bound_while_streaming() {
        let source = batches(&(0..1000).collect::<Vec<_>>(), 10).into_iter();
        let mut stream =
            StreamShuffleBuffer::new(source, 10, 100, StdRng::seed_from_u64(0)).unwrap();
        let first = stream.next().unwrap().unwrap();
        assert_eq!(first.len(), 10);
        assert_eq!(stream.buffered(), 100);
    }

    #[test]
    fn test_error_ends_stream() {
        let source = vec![
            Ok(vec![1u64, 2]),
            Err(GraphError::engine("pull_node_batch", "boom")),
            Ok(vec![3, 4]),
        ]
        .into_iter();
        let mut stream =
            StreamShuffleBuffer::new(source, 2, 10, StdRng::seed_from_u64(0)).unwrap();
        assert!(stream.next().unwrap().is_err());
        assert!(stream.next().is_none());
        assert!(stream.next().is_none());
    }

    #[test]
    fn test_rejects_zero_sizes() {
        let source = std::iter::empty::<Result<Vec<u64>>>();
        assert!(StreamShuffleBuffer::new(source, 0, 10, StdRng::seed_from_u64(0)).is_err());
        let source = std::iter::empty::<Result<Vec<u64>>>();
        assert!(StreamShuffleBuffer::new(source, 4, 0, StdRng::seed_from_u64(0)).is_err());
    }
}
