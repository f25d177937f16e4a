//! Ready-made task configurations and inputs.

use super::builders::TupleBuilder;
use crate::config::{OutputDecl, StageConfig, TaskConfig};
use crate::error::{DEFAULT_LABEL, ReduceResult};
use crate::record::{Field, Tuple};
use crate::router::Sink;
use crate::sampler::{NoopInstrumentation, NullMemoryProbe};
use crate::schema::{FieldType, Schema};
use crate::session::ReduceSession;

/// One string key column `word`, one `BIGINT` value column `n`.
#[must_use]
pub fn words_config() -> TaskConfig {
    TaskConfig::new(
        Schema::of(&[("word", FieldType::String)]),
        Schema::of(&[("n", FieldType::Bigint)]),
    )
}

/// `(A,1),(A,2),(B,3),(B,4),(B,5)`.
#[must_use]
pub fn words_tuples() -> Vec<Tuple> {
    TupleBuilder::new()
        .group("A", [1, 2])
        .group("B", [3, 4, 5])
        .build()
}

/// A quiet session over [`words_tuples`] writing to `sink`.
///
/// # Errors
///
/// Only if the fixture configuration were invalid.
pub fn words_session(sink: impl Sink + 'static) -> ReduceResult<ReduceSession> {
    ReduceSession::builder(words_config())
        .source(words_tuples().into_iter())
        .sink(sink)
        .instrumentation(NoopInstrumentation)
        .memory_probe(NullMemoryProbe)
        .build()
}

/// [`words_config`] with the extra label `totals` declared next to the default one.
#[must_use]
pub fn labeled_words_config() -> TaskConfig {
    words_config().with_outputs(vec![
        OutputDecl::new(DEFAULT_LABEL),
        OutputDecl::new("totals").with_schema(Schema::of(&[
            ("word", FieldType::String),
            ("total", FieldType::Bigint),
        ])),
    ])
}

/// [`words_config`] forwarding `(word, n)` pairs to a further stage.
#[must_use]
pub fn pipelined_words_config(num_partitions: u32) -> TaskConfig {
    words_config().with_stage(
        StageConfig {
            output_key_schema: Schema::of(&[("word", FieldType::String)]),
            output_value_schema: Schema::of(&[("n", FieldType::Bigint)]),
        },
        num_partitions,
    )
}

/// Key `(dept, year)`, value `salary`, grouped on `dept` only.
#[must_use]
pub fn payroll_config() -> TaskConfig {
    TaskConfig::new(
        Schema::of(&[("dept", FieldType::String), ("year", FieldType::Bigint)]),
        Schema::of(&[("salary", FieldType::Double)]),
    )
    .with_grouping_columns(["dept"])
}

/// Payroll rows sorted by `(dept, year)`: two `eng` years, one `ops` year.
#[must_use]
pub fn payroll_tuples() -> Vec<Tuple> {
    TupleBuilder::new()
        .tuple([Field::from("eng"), Field::from(2023), Field::from(100.5)])
        .tuple([Field::from("eng"), Field::from(2024), Field::from(120.0)])
        .tuple([Field::from("ops"), Field::from(2024), Field::from(90.0)])
        .build()
}
