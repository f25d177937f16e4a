//! # Ironreduce
//!
//! A **grouped-reduce iteration engine** for the reduce side of a sort/shuffle
//! pipeline. An upstream source delivers flat tuples already sorted by key;
//! Ironreduce turns that stream into a sequence of *(key, lazy values)* groups,
//! hands each group to user reduce logic, and routes whatever that logic emits
//! either to labeled final output or, re-partitioned, to a further stage.
//!
//! ## Key Features
//!
//! - **One tuple of lookahead** - never reads further ahead than a single tuple
//! - **Lazy values** - values nobody asks for are pulled only when the next group
//!   starts, and are drained rather than leaked into it
//! - **Reused holders** - one key record and one value record per session,
//!   overwritten on every advance; snapshot explicitly to keep a copy
//! - **Pluggable grouping** - grouping comparator, sort comparator, or key columns
//! - **Labeled and pipelined output** - declared labels, optional partitioner,
//!   optional inner framing for chained stages
//! - **Progress sampling** - backoff-scheduled events with memory readings,
//!   delivered to a task-scoped instrumentation sink
//!
//! ## Quick Start
//!
//! ```
//! use ironreduce::*;
//! use ironreduce::testing::{words_config, words_tuples, CollectingSink};
//!
//! struct Total;
//!
//! impl Reducer for Total {
//!     fn reduce(&mut self, key: &Record, values: &mut Values<'_>, ctx: &mut TaskOutput) -> anyhow::Result<()> {
//!         let mut sum = 0;
//!         while let Some(v) = values.next_value()? {
//!             sum += v.get(0).and_then(Field::as_i64).unwrap_or(0);
//!         }
//!         let mut row = key.fields().to_vec();
//!         row.push(Field::from(sum));
//!         ctx.write(&Record::from_fields(std::sync::Arc::new(
//!             Schema::of(&[("word", FieldType::String), ("sum", FieldType::Bigint)]),
//!         ), row)?)?;
//!         Ok(())
//!     }
//! }
//!
//! # fn main() -> anyhow::Result<()> {
//! let sink = CollectingSink::new();
//! let session = ReduceSession::builder(words_config())
//!     .source(words_tuples().into_iter())
//!     .sink(sink.clone())
//!     .build()?;
//! let summary = run_reducer(session, &mut Total)?;
//!
//! assert_eq!(summary.input_keys, 2);
//! assert_eq!(summary.input_values, 5);
//! assert_eq!(sink.records()[0].fields, vec![Field::from("A"), Field::from(3)]);
//! # Ok(())
//! # }
//! ```
//!
//! ## Core Concepts
//!
//! ### Tuples, keys and values
//!
//! A [`Tuple`] is `[key fields][value fields]`, split by the key and value
//! [`Schema`]s of the [`TaskConfig`]. A tuple of the wrong width is a fatal
//! [`ReduceError::MalformedTuple`].
//!
//! ### Sessions
//!
//! A [`ReduceSession`] is one task's engine instance. Call
//! [`advance_group`](ReduceSession::advance_group) until it returns `false`,
//! reading [`current_key`](ReduceSession::current_key) and
//! [`values_of_current_group`](ReduceSession::values_of_current_group) in
//! between, or hand the session to [`run_reducer`] with a [`Reducer`].
//!
//! ### Output
//!
//! [`TaskOutput::write_labeled`] accepts only labels declared in the
//! configuration. [`TaskOutput::write_pair`] is only valid when the session
//! forwards to a further stage; with a [`Partitioner`] the partition index
//! leads the record and must lie in `[0, num_partitions)`.
//!
//! ## Error Handling
//!
//! Engine operations return [`ReduceResult`]. Reduce logic and [`run_reducer`]
//! use `anyhow::Result`; a [`ReduceError`] converts with `?` and can be
//! recovered with `downcast_ref`. No error is retried inside the engine.
//!
//! ## Feature Flags
//!
//! - `process-memory` (default) - resident memory readings through `sysinfo`;
//!   without it the default probe reports zero
//!
//! ## Module Overview
//!
//! - [`cursor`] - the grouping cursor and the lending [`Values`] sequence
//! - [`session`] - sessions, the write path and the reducer lifecycle
//! - [`router`] - final, pipelined and inner-framed output
//! - [`sampler`] - progress sampling, instrumentation and memory probes
//! - [`combine`] - per-group folding reducers
//! - [`testing`] - in-memory mocks, builders, fixtures and assertions

pub mod combine;
pub mod comparator;
pub mod config;
pub mod cursor;
pub mod error;
pub mod metrics;
pub mod record;
pub mod router;
pub mod sampler;
pub mod schema;
pub mod session;
pub mod source;
pub mod testing;
pub mod type_mapper;

// General re-exports
pub use combine::{CombiningReducer, CountValues, GroupCombiner, SumColumn};
pub use comparator::{ColumnComparator, GroupingComparator};
pub use config::{OutputDecl, StageConfig, TaskConfig};
pub use cursor::Values;
pub use error::{DEFAULT_LABEL, INNER_OUTPUT_LABEL, ReduceError, ReduceResult};
pub use metrics::MetricsCollector;
pub use record::{Field, Record, Tuple};
pub use router::{HashPartitioner, OutputRecord, Partitioner, Sink};
pub use sampler::{
    Instrumentation, LogInstrumentation, MemoryProbe, NoopInstrumentation, NullMemoryProbe,
    ProgressEvent, SamplerPolicy,
};
pub use schema::{Column, FieldType, Schema};
pub use session::{ReduceSession, Reducer, SessionBuilder, SessionState, TaskOutput, TaskSummary, run_reducer};
pub use source::{InputCounters, TupleSource};
