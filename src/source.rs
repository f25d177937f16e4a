//! The upstream pull source and the counting channel wrapped around it.

use crate::error::{ReduceError, ReduceResult};
use crate::record::Tuple;
use crate::sampler::ProgressSampler;

/// A pull-based stream of flat `[key fields][value fields]` tuples, already
/// sorted so that comparator-equal keys are adjacent.
pub trait TupleSource: Send {
    /// Next tuple, or `Ok(None)` at end of stream.
    ///
    /// # Errors
    ///
    /// Transport or decode failures; they are fatal for the task.
    fn pull(&mut self) -> anyhow::Result<Option<Tuple>>;
}

impl<I> TupleSource for I
where
    I: Iterator<Item = Tuple> + Send,
{
    fn pull(&mut self) -> anyhow::Result<Option<Tuple>> {
        Ok(self.next())
    }
}

/// Input-side counters of a reduce session.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct InputCounters {
    /// Tuples successfully pulled. Never reset.
    pub values: u64,
    /// Groups yielded.
    pub keys: u64,
}

/// The only path from the engine to the upstream source.
///
/// Checks tuple width, counts successful pulls and feeds the progress sampler.
/// Once the source reports end of stream it is never polled again.
pub struct InputChannel {
    source: Box<dyn TupleSource>,
    tuple_width: usize,
    counters: InputCounters,
    sampler: ProgressSampler,
    exhausted: bool,
}

impl InputChannel {
    pub fn new(source: Box<dyn TupleSource>, tuple_width: usize, sampler: ProgressSampler) -> Self {
        Self {
            source,
            tuple_width,
            counters: InputCounters::default(),
            sampler,
            exhausted: false,
        }
    }

    /// Pull one raw tuple.
    ///
    /// # Errors
    ///
    /// [`ReduceError::Source`] if the source fails, [`ReduceError::MalformedTuple`]
    /// if the tuple does not match the key/value schema split.
    pub fn pull(&mut self) -> ReduceResult<Option<Tuple>> {
        self.pull_counted(false)
    }

    /// Pull the tuple that opens a new group.
    ///
    /// Same as [`pull`](Self::pull), except that a progress event fired by
    /// this pull already counts the group being opened.
    ///
    /// # Errors
    ///
    /// As for [`pull`](Self::pull).
    pub fn pull_opening_group(&mut self) -> ReduceResult<Option<Tuple>> {
        self.pull_counted(true)
    }

    fn pull_counted(&mut self, opening_group: bool) -> ReduceResult<Option<Tuple>> {
        if self.exhausted {
            return Ok(None);
        }
        let Some(tuple) = self.source.pull().map_err(ReduceError::Source)? else {
            self.exhausted = true;
            return Ok(None);
        };
        if tuple.len() != self.tuple_width {
            return Err(ReduceError::MalformedTuple {
                expected: self.tuple_width,
                actual: tuple.len(),
            });
        }
        self.counters.values += 1;
        let keys = self.counters.keys + u64::from(opening_group);
        self.sampler.observe(keys, self.counters.values);
        Ok(Some(tuple))
    }

    pub(crate) fn record_group(&mut self) {
        self.counters.keys += 1;
    }

    #[must_use]
    pub fn counters(&self) -> InputCounters {
        self.counters
    }

    #[must_use]
    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    pub fn sampler_mut(&mut self) -> &mut ProgressSampler {
        &mut self.sampler
    }
}
