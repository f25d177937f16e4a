//! Per-group folding reducers.
//!
//! A [`GroupCombiner`] folds the values of one group into an accumulator and
//! turns it into result fields. [`CombiningReducer`] wraps one as a
//! [`Reducer`]: for every group it writes `[key fields][result fields]` either
//! to a declared label or, when the session forwards to a further stage, as a
//! key/value pair.
//!
//! - [`CountValues`] - number of values in the group (`BIGINT`).
//! - [`SumColumn`] - sum of one `BIGINT` or `DOUBLE` value column; nulls are skipped.
//!
//! ```
//! use ironreduce::*;
//! use ironreduce::testing::{words_session, CollectingSink};
//!
//! # fn main() -> anyhow::Result<()> {
//! let sink = CollectingSink::new();
//! let session = words_session(sink.clone())?;
//! let summary = run_reducer(session, &mut CombiningReducer::new(CountValues))?;
//! assert_eq!(summary.output_records, 2);
//! assert_eq!(sink.records()[1].fields, vec![Field::from("B"), Field::from(3)]);
//! # Ok(())
//! # }
//! ```

use crate::cursor::Values;
use crate::error::DEFAULT_LABEL;
use crate::record::{Field, Record};
use crate::schema::{FieldType, Schema};
use crate::session::{Reducer, TaskOutput};
use anyhow::{Context, Result, bail};
use std::sync::Arc;

/// Folds the values of a single group.
///
/// Mirrors the `create` / `add_input` / `finish` shape of a combine function,
/// with no merge step: one group is always folded by one accumulator.
pub trait GroupCombiner {
    type Acc;

    fn create(&self) -> Self::Acc;

    /// # Errors
    ///
    /// A value the combiner cannot fold; aborts the task.
    fn add_input(&self, acc: &mut Self::Acc, value: &Record) -> Result<()>;

    fn finish(&self, acc: Self::Acc) -> Vec<Field>;

    /// Columns produced by [`GroupCombiner::finish`].
    fn output_schema(&self) -> Schema;
}

/// Number of values per group.
#[derive(Clone, Copy, Debug, Default)]
pub struct CountValues;

impl GroupCombiner for CountValues {
    type Acc = i64;

    fn create(&self) -> i64 {
        0
    }

    fn add_input(&self, acc: &mut i64, _value: &Record) -> Result<()> {
        *acc += 1;
        Ok(())
    }

    fn finish(&self, acc: i64) -> Vec<Field> {
        vec![Field::Bigint(acc)]
    }

    fn output_schema(&self) -> Schema {
        Schema::of(&[("count", FieldType::Bigint)])
    }
}

/// Sum of one value column.
#[derive(Clone, Debug)]
pub struct SumColumn {
    column: String,
    ty: FieldType,
}

/// Running total of a [`SumColumn`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum SumAcc {
    Bigint(i64),
    Double(f64),
}

impl SumColumn {
    /// Integer sum; overflow aborts the task.
    pub fn bigint(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            ty: FieldType::Bigint,
        }
    }

    /// Floating-point sum. Integer values are widened.
    pub fn double(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            ty: FieldType::Double,
        }
    }

    #[must_use]
    pub fn column(&self) -> &str {
        &self.column
    }
}

impl GroupCombiner for SumColumn {
    type Acc = SumAcc;

    fn create(&self) -> SumAcc {
        match self.ty {
            FieldType::Bigint => SumAcc::Bigint(0),
            _ => SumAcc::Double(0.0),
        }
    }

    #[allow(clippy::cast_precision_loss)]
    fn add_input(&self, acc: &mut SumAcc, value: &Record) -> Result<()> {
        let field = value
            .get_by_name(&self.column)
            .with_context(|| format!("value has no column '{}'", self.column))?;
        match (acc, field) {
            (_, Field::Null) => {}
            (SumAcc::Bigint(total), Field::Bigint(v)) => {
                *total = total
                    .checked_add(*v)
                    .with_context(|| format!("sum of '{}' overflows", self.column))?;
            }
            (SumAcc::Double(total), Field::Bigint(v)) => *total += *v as f64,
            (SumAcc::Double(total), Field::Double(v)) => *total += v.into_inner(),
            (_, other) => bail!("cannot sum {other} in column '{}'", self.column),
        }
        Ok(())
    }

    fn finish(&self, acc: SumAcc) -> Vec<Field> {
        match acc {
            SumAcc::Bigint(v) => vec![Field::Bigint(v)],
            SumAcc::Double(v) => vec![Field::from(v)],
        }
    }

    fn output_schema(&self) -> Schema {
        Schema::of(&[("sum", self.ty.clone())])
    }
}

/// Runs a [`GroupCombiner`] over every group of a session.
pub struct CombiningReducer<C> {
    combiner: C,
    label: String,
    result_schema: Arc<Schema>,
    row_schema: Option<Arc<Schema>>,
}

impl<C: GroupCombiner> CombiningReducer<C> {
    /// Writes results under the default label, or as pairs when forwarding.
    pub fn new(combiner: C) -> Self {
        let result_schema = Arc::new(combiner.output_schema());
        Self {
            combiner,
            label: DEFAULT_LABEL.to_string(),
            result_schema,
            row_schema: None,
        }
    }

    /// Write final output under `label` instead of the default one.
    #[must_use]
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    fn row_schema(&mut self, key: &Record) -> Arc<Schema> {
        let result = &self.result_schema;
        Arc::clone(
            self.row_schema
                .get_or_insert_with(|| Arc::new(key.schema().concat(result))),
        )
    }
}

impl<C: GroupCombiner> Reducer for CombiningReducer<C> {
    fn setup(&mut self, ctx: &mut TaskOutput) -> Result<()> {
        if !ctx.forwards() && !ctx.has_label(&self.label) {
            bail!("combiner output label '{}' is not declared", self.label);
        }
        Ok(())
    }

    fn reduce(&mut self, key: &Record, values: &mut Values<'_>, ctx: &mut TaskOutput) -> Result<()> {
        let mut acc = self.combiner.create();
        while let Some(v) = values.next_value()? {
            self.combiner.add_input(&mut acc, v)?;
        }
        let result = self.combiner.finish(acc);

        if ctx.forwards() {
            let value = Record::from_fields(Arc::clone(&self.result_schema), result)?;
            ctx.write_pair(key, &value)?;
        } else {
            let mut fields = key.fields().to_vec();
            fields.extend(result);
            let row = Record::from_fields(self.row_schema(key), fields)?;
            ctx.write_labeled(&row, &self.label)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn value(schema: &Arc<Schema>, f: Field) -> Record {
        Record::from_fields(Arc::clone(schema), vec![f]).unwrap()
    }

    #[test]
    fn count_ignores_contents() {
        let s = Arc::new(Schema::of(&[("v", FieldType::String)]));
        let c = CountValues;
        let mut acc = c.create();
        c.add_input(&mut acc, &value(&s, Field::Null)).unwrap();
        c.add_input(&mut acc, &value(&s, Field::from("x"))).unwrap();
        assert_eq!(c.finish(acc), vec![Field::Bigint(2)]);
    }

    #[test]
    fn bigint_sum_skips_nulls_and_detects_overflow() {
        let s = Arc::new(Schema::of(&[("n", FieldType::Bigint)]));
        let c = SumColumn::bigint("n");
        let mut acc = c.create();
        c.add_input(&mut acc, &value(&s, Field::from(3))).unwrap();
        c.add_input(&mut acc, &value(&s, Field::Null)).unwrap();
        assert_eq!(acc, SumAcc::Bigint(3));
        c.add_input(&mut acc, &value(&s, Field::Bigint(i64::MAX))).unwrap_err();
    }

    #[test]
    fn double_sum_widens_integers() {
        let s = Arc::new(Schema::of(&[("n", FieldType::Double)]));
        let c = SumColumn::double("n");
        let mut acc = c.create();
        c.add_input(&mut acc, &value(&s, Field::from(1.5))).unwrap();
        c.add_input(&mut acc, &value(&s, Field::from(2))).unwrap();
        assert_eq!(c.finish(acc), vec![Field::from(3.5)]);
        assert_eq!(c.output_schema().column(0).unwrap().ty, FieldType::Double);
    }

    #[test]
    fn sum_rejects_text_and_missing_columns() {
        let s = Arc::new(Schema::of(&[("n", FieldType::String)]));
        let c = SumColumn::bigint("n");
        let mut acc = c.create();
        assert!(c.add_input(&mut acc, &value(&s, Field::from("x"))).is_err());
        let other = SumColumn::bigint("missing");
        assert!(other.add_input(&mut acc, &value(&s, Field::Null)).is_err());
    }
}
