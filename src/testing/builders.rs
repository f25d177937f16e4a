//! Builders for sorted tuple streams.

use crate::record::{Field, Tuple};

/// A fluent builder for flat `[key fields][value fields]` input streams.
///
/// Rows come out in the order they were added; keeping them sorted is up to
/// the caller, exactly as with a real shuffle.
///
/// # Example
///
/// ```
/// use ironreduce::record::Field;
/// use ironreduce::testing::TupleBuilder;
///
/// let rows = TupleBuilder::new()
///     .group("A", [1, 2])
///     .group("B", [3])
///     .build();
///
/// assert_eq!(rows.len(), 3);
/// assert_eq!(rows[2], vec![Field::from("B"), Field::from(3)]);
/// ```
#[derive(Clone, Debug, Default)]
pub struct TupleBuilder {
    rows: Vec<Tuple>,
}

impl TupleBuilder {
    #[must_use]
    pub const fn new() -> Self {
        Self { rows: Vec::new() }
    }

    /// Add one raw tuple.
    #[must_use]
    pub fn tuple<F: Into<Field>>(mut self, fields: impl IntoIterator<Item = F>) -> Self {
        self.rows.push(fields.into_iter().map(Into::into).collect());
        self
    }

    /// Add one tuple from separate key and value parts.
    #[must_use]
    pub fn row<K, V>(mut self, key: impl IntoIterator<Item = K>, value: impl IntoIterator<Item = V>) -> Self
    where
        K: Into<Field>,
        V: Into<Field>,
    {
        let mut t: Tuple = key.into_iter().map(Into::into).collect();
        t.extend(value.into_iter().map(Into::into));
        self.rows.push(t);
        self
    }

    /// Add a run of single-column values under one single-column key.
    #[must_use]
    pub fn group<V: Into<Field>>(mut self, key: impl Into<Field>, values: impl IntoIterator<Item = V>) -> Self {
        let key = key.into();
        for v in values {
            self.rows.push(vec![key.clone(), v.into()]);
        }
        self
    }

    /// Add the same tuple `count` times.
    ///
    /// ```
    /// use ironreduce::testing::TupleBuilder;
    ///
    /// let rows = TupleBuilder::new().repeated(["k", "v"], 3).build();
    /// assert_eq!(rows.len(), 3);
    /// ```
    #[must_use]
    pub fn repeated<F: Into<Field> + Clone>(mut self, fields: impl IntoIterator<Item = F>, count: usize) -> Self {
        let t: Tuple = fields.into_iter().map(Into::into).collect();
        for _ in 0..count {
            self.rows.push(t.clone());
        }
        self
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    #[must_use]
    pub fn build(self) -> Vec<Tuple> {
        self.rows
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn row_concatenates_key_and_value() {
        let rows = TupleBuilder::new().row(["d", "2024"], [7]).build();
        assert_eq!(rows, vec![vec![Field::from("d"), Field::from("2024"), Field::from(7)]]);
    }
}
