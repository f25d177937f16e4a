//! The grouping cursor: one key, many values, over a flat sorted stream.
//!
//! The cursor keeps exactly one tuple of lookahead. Asking whether the group
//! continues pulls at most one tuple; values nobody asks for are not pulled
//! until the next [`GroupingCursor::prime_or_reset`], which drains them before
//! loading the next key. A lookahead that belongs to the next group is kept and
//! becomes that group's first tuple.

use crate::comparator::GroupingComparator;
use crate::error::ReduceResult;
use crate::record::{Record, Tuple};
use crate::schema::Schema;
use crate::source::InputChannel;
use std::sync::Arc;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CursorState {
    /// Nothing pulled yet.
    Unprimed,
    /// A key is loaded and its values can be iterated.
    InGroup,
    /// The upstream source is exhausted.
    Terminal,
}

/// Value-side state of the cursor: the input, the value holder and the lookahead.
pub(crate) struct ValueStream {
    input: InputChannel,
    comparator: Arc<dyn GroupingComparator>,
    key_width: usize,
    value: Record,
    lookahead: Option<Tuple>,
    first_pending: bool,
}

impl ValueStream {
    /// Pull into the lookahead slot if empty, then test it against `key`.
    fn lookahead_matches(&mut self, key: &Record) -> ReduceResult<bool> {
        if self.lookahead.is_none() {
            self.lookahead = self.input.pull()?;
        }
        Ok(match &self.lookahead {
            Some(t) => self
                .comparator
                .same_group(&t[..self.key_width], key.fields()),
            None => false,
        })
    }

    fn has_next(&mut self, key: &Record) -> ReduceResult<bool> {
        if self.first_pending {
            return Ok(true);
        }
        self.lookahead_matches(key)
    }

    fn next(&mut self, key: &Record) -> ReduceResult<Option<&Record>> {
        if self.first_pending {
            self.first_pending = false;
            return Ok(Some(&self.value));
        }
        if !self.lookahead_matches(key)? {
            return Ok(None);
        }
        let Some(mut tuple) = self.lookahead.take() else {
            return Ok(None);
        };
        self.value.assign(tuple.drain(self.key_width..))?;
        Ok(Some(&self.value))
    }

    fn drain(&mut self, key: &Record) -> ReduceResult<()> {
        self.first_pending = false;
        while self.lookahead_matches(key)? {
            self.lookahead = None;
        }
        Ok(())
    }
}

/// Groups a sorted tuple stream by comparator-equal key prefixes.
///
/// The key and value holders are reused for every group and value; see
/// [`Record::snapshot`] for keeping a copy.
pub struct GroupingCursor {
    key: Record,
    stream: ValueStream,
    state: CursorState,
}

impl GroupingCursor {
    pub fn new(
        input: InputChannel,
        comparator: Arc<dyn GroupingComparator>,
        key_schema: Arc<Schema>,
        value_schema: Arc<Schema>,
    ) -> Self {
        let key_width = key_schema.len();
        Self {
            key: Record::new(key_schema),
            stream: ValueStream {
                input,
                comparator,
                key_width,
                value: Record::new(value_schema),
                lookahead: None,
                first_pending: false,
            },
            state: CursorState::Unprimed,
        }
    }

    /// Move to the next group.
    ///
    /// On first use this seeds the cursor from the source. Afterwards it drains
    /// any values of the current group the caller did not read, then loads the
    /// buffered lookahead (or the next pulled tuple) as the new key and first
    /// value. Returns `false` once the source is exhausted; every later call
    /// also returns `false`.
    ///
    /// # Errors
    ///
    /// Propagates source failures and malformed tuples.
    pub fn prime_or_reset(&mut self) -> ReduceResult<bool> {
        let next = match self.state {
            CursorState::Terminal => return Ok(false),
            CursorState::Unprimed => self.stream.input.pull_opening_group()?,
            CursorState::InGroup => {
                self.stream.drain(&self.key)?;
                match self.stream.lookahead.take() {
                    Some(t) => Some(t),
                    None => self.stream.input.pull_opening_group()?,
                }
            }
        };
        let Some(mut tuple) = next else {
            self.state = CursorState::Terminal;
            return Ok(false);
        };
        let key_width = self.stream.key_width;
        self.stream.value.assign(tuple.drain(key_width..))?;
        self.key.assign(tuple)?;
        self.stream.first_pending = true;
        self.state = CursorState::InGroup;
        self.stream.input.record_group();
        Ok(true)
    }

    #[must_use]
    pub fn state(&self) -> CursorState {
        self.state
    }

    /// The current key, only while a group is loaded.
    #[must_use]
    pub fn key(&self) -> Option<&Record> {
        (self.state == CursorState::InGroup).then_some(&self.key)
    }

    /// True if the current group has another value to hand out.
    ///
    /// # Errors
    ///
    /// May pull one tuple; propagates its failure.
    pub fn has_next(&mut self) -> ReduceResult<bool> {
        if self.state != CursorState::InGroup {
            return Ok(false);
        }
        self.stream.has_next(&self.key)
    }

    /// Decode the next value of the current group into the value holder.
    ///
    /// # Errors
    ///
    /// May pull one tuple; propagates its failure.
    pub fn next_value(&mut self) -> ReduceResult<Option<&Record>> {
        if self.state != CursorState::InGroup {
            return Ok(None);
        }
        self.stream.next(&self.key)
    }

    /// The values of the current group as a single-pass sequence.
    ///
    /// Outside a group the sequence is empty. A second call on the same group
    /// resumes after whatever was already consumed, so it is empty after a
    /// full traversal.
    pub fn values(&mut self) -> Values<'_> {
        let key = (self.state == CursorState::InGroup).then_some(&self.key);
        Values {
            key,
            stream: &mut self.stream,
        }
    }

    /// Split into the current key and its value sequence.
    pub fn group(&mut self) -> Option<(&Record, Values<'_>)> {
        if self.state != CursorState::InGroup {
            return None;
        }
        let key = &self.key;
        Some((
            key,
            Values {
                key: Some(key),
                stream: &mut self.stream,
            },
        ))
    }

    /// True if a tuple is buffered that has not been handed out yet.
    #[must_use]
    pub fn has_buffered_lookahead(&self) -> bool {
        self.stream.lookahead.is_some()
    }

    #[must_use]
    pub fn input(&self) -> &InputChannel {
        &self.stream.input
    }

    pub fn input_mut(&mut self) -> &mut InputChannel {
        &mut self.stream.input
    }
}

/// Lending, forward-only sequence over the values of one group.
///
/// Each returned `&Record` is the shared value holder and is overwritten by
/// the following call.
///
/// ```
/// use ironreduce::testing::{words_session, CollectingSink};
///
/// # fn main() -> anyhow::Result<()> {
/// let sink = CollectingSink::new();
/// let mut session = words_session(sink)?;
/// assert!(session.advance_group()?);
/// let mut values = session.values_of_current_group();
/// let mut seen = Vec::new();
/// while let Some(v) = values.next_value()? {
///     seen.push(v.get(0).cloned());
/// }
/// assert_eq!(seen.len(), 2);
/// # Ok(())
/// # }
/// ```
pub struct Values<'a> {
    key: Option<&'a Record>,
    stream: &'a mut ValueStream,
}

impl Values<'_> {
    /// The group key this sequence belongs to.
    #[must_use]
    pub fn key(&self) -> Option<&Record> {
        self.key
    }

    /// # Errors
    ///
    /// May pull one tuple; propagates its failure.
    pub fn has_next(&mut self) -> ReduceResult<bool> {
        match self.key {
            Some(key) => self.stream.has_next(key),
            None => Ok(false),
        }
    }

    /// # Errors
    ///
    /// May pull one tuple; propagates its failure.
    pub fn next_value(&mut self) -> ReduceResult<Option<&Record>> {
        match self.key {
            Some(key) => self.stream.next(key),
            None => Ok(None),
        }
    }

    /// Copy every remaining value out of the holder.
    ///
    /// # Errors
    ///
    /// Propagates pull failures.
    pub fn snapshot_all(&mut self) -> ReduceResult<Vec<Record>> {
        let mut out = Vec::new();
        while let Some(v) = self.next_value()? {
            out.push(v.snapshot());
        }
        Ok(out)
    }

    /// Consume the rest of the group, returning how many values were skipped.
    ///
    /// # Errors
    ///
    /// Propagates pull failures.
    pub fn skip_rest(&mut self) -> ReduceResult<u64> {
        let mut n = 0;
        while self.next_value()?.is_some() {
            n += 1;
        }
        Ok(n)
    }
}
