//! Grouping comparators decide whether two key prefixes belong to one group.
//!
//! The comparator must agree with the order the upstream sort produced; that
//! is a precondition and is never checked. Any `Fn(&[Field], &[Field]) -> Ordering`
//! closure is a comparator.

use crate::error::{ReduceError, ReduceResult};
use crate::record::Field;
use crate::schema::Schema;
use std::cmp::Ordering;
use std::sync::Arc;

/// Compares the key-field prefixes of two tuples.
pub trait GroupingComparator: Send + Sync {
    fn compare(&self, a: &[Field], b: &[Field]) -> Ordering;

    fn same_group(&self, a: &[Field], b: &[Field]) -> bool {
        self.compare(a, b) == Ordering::Equal
    }
}

impl<F> GroupingComparator for F
where
    F: Fn(&[Field], &[Field]) -> Ordering + Send + Sync,
{
    fn compare(&self, a: &[Field], b: &[Field]) -> Ordering {
        self(a, b)
    }
}

/// Compares a fixed subset of key columns, in order, using the natural field order.
#[derive(Clone, Debug)]
pub struct ColumnComparator {
    indices: Vec<usize>,
}

impl ColumnComparator {
    /// Compare on `columns`, resolved against `key_schema`.
    ///
    /// # Errors
    ///
    /// Returns [`ReduceError::Config`] if a column is missing from the key schema
    /// or no columns are given.
    pub fn new<S: AsRef<str>>(columns: &[S], key_schema: &Schema) -> ReduceResult<Self> {
        if columns.is_empty() {
            return Err(ReduceError::config("grouping columns must not be empty"));
        }
        let indices = columns
            .iter()
            .map(|c| {
                let name = c.as_ref();
                key_schema.index_of(name).ok_or_else(|| {
                    ReduceError::config(format!("grouping column '{name}' is not a key column"))
                })
            })
            .collect::<ReduceResult<Vec<_>>>()?;
        Ok(Self { indices })
    }

    /// Compare on every key column.
    #[must_use]
    pub fn all_columns(key_schema: &Schema) -> Self {
        Self {
            indices: (0..key_schema.len()).collect(),
        }
    }
}

impl GroupingComparator for ColumnComparator {
    fn compare(&self, a: &[Field], b: &[Field]) -> Ordering {
        for &i in &self.indices {
            let ord = a.get(i).cmp(&b.get(i));
            if ord != Ordering::Equal {
                return ord;
            }
        }
        Ordering::Equal
    }
}

/// Pick the comparator used for group boundaries.
///
/// An explicit grouping comparator wins; otherwise the sort comparator is reused
/// for grouping; otherwise a [`ColumnComparator`] over `grouping_columns`, or
/// over every key column when none are named.
///
/// # Errors
///
/// Returns [`ReduceError::Config`] if the column-based fallback cannot be built.
pub fn resolve_comparator(
    grouping: Option<Arc<dyn GroupingComparator>>,
    sort: Option<Arc<dyn GroupingComparator>>,
    grouping_columns: Option<&[String]>,
    key_schema: &Schema,
) -> ReduceResult<Arc<dyn GroupingComparator>> {
    if let Some(c) = grouping.or(sort) {
        return Ok(c);
    }
    let column_based = match grouping_columns {
        Some(cols) => ColumnComparator::new(cols, key_schema)?,
        None => ColumnComparator::all_columns(key_schema),
    };
    Ok(Arc::new(column_based))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::FieldType;

    fn key_schema() -> Schema {
        Schema::of(&[("region", FieldType::String), ("day", FieldType::Bigint)])
    }

    #[test]
    fn column_comparator_ignores_unlisted_columns() {
        let c = ColumnComparator::new(&["region"], &key_schema()).unwrap();
        let a = [Field::from("eu"), Field::from(1)];
        let b = [Field::from("eu"), Field::from(2)];
        assert!(c.same_group(&a, &b));

        let all = ColumnComparator::all_columns(&key_schema());
        assert_eq!(all.compare(&a, &b), Ordering::Less);
    }

    #[test]
    fn unknown_grouping_column_is_a_config_error() {
        let err = ColumnComparator::new(&["nope"], &key_schema()).unwrap_err();
        assert!(err.is_fatal_config());
    }

    #[test]
    fn grouping_comparator_takes_precedence_over_sort() {
        let grouping: Arc<dyn GroupingComparator> =
            Arc::new(|_: &[Field], _: &[Field]| Ordering::Equal);
        let sort: Arc<dyn GroupingComparator> =
            Arc::new(|_: &[Field], _: &[Field]| Ordering::Less);

        let a = [Field::from("x"), Field::from(1)];
        let picked = resolve_comparator(Some(grouping), Some(Arc::clone(&sort)), None, &key_schema())
            .unwrap();
        assert!(picked.same_group(&a, &a));

        let fallback = resolve_comparator(None, Some(sort), None, &key_schema()).unwrap();
        assert!(!fallback.same_group(&a, &a));
    }

    #[test]
    fn column_fallback_uses_named_columns() {
        let cols = vec!["day".to_string()];
        let c = resolve_comparator(None, None, Some(&cols), &key_schema()).unwrap();
        let a = [Field::from("eu"), Field::from(7)];
        let b = [Field::from("us"), Field::from(7)];
        assert!(c.same_group(&a, &b));
    }
}
