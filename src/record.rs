//! Field values and the long-lived record holders.
//!
//! A [`Record`] is a scratch buffer bound to a [`Schema`]. The reduce session
//! owns one key holder and one value holder and overwrites them in place on every
//! advance, so a `&Record` handed to reduce logic is only valid until the next
//! call into the session. Use [`Record::snapshot`] to keep a copy.

use crate::error::{ReduceError, ReduceResult};
use crate::schema::Schema;
use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// A single decoded field value.
///
/// The derived ordering is total (doubles compare via [`OrderedFloat`]), which is
/// what the column-based grouping comparator relies on. `Null` sorts first.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Field {
    Null,
    Bigint(i64),
    String(String),
    Double(OrderedFloat<f64>),
    Boolean(bool),
    /// Milliseconds since the Unix epoch.
    Datetime(i64),
    /// Canonical textual form of a fixed-point decimal.
    Decimal(String),
    Array(Vec<Field>),
    Map(Vec<(Field, Field)>),
}

impl Field {
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Bigint(v) | Self::Datetime(v) => Some(*v),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Double(v) => Some(v.0),
            #[allow(clippy::cast_precision_loss)]
            Self::Bigint(v) => Some(*v as f64),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) | Self::Decimal(s) => Some(s),
            _ => None,
        }
    }
}

impl From<i64> for Field {
    fn from(v: i64) -> Self {
        Self::Bigint(v)
    }
}

impl From<i32> for Field {
    fn from(v: i32) -> Self {
        Self::Bigint(i64::from(v))
    }
}

impl From<f64> for Field {
    fn from(v: f64) -> Self {
        Self::Double(OrderedFloat(v))
    }
}

impl From<bool> for Field {
    fn from(v: bool) -> Self {
        Self::Boolean(v)
    }
}

impl From<&str> for Field {
    fn from(v: &str) -> Self {
        Self::String(v.to_string())
    }
}

impl From<String> for Field {
    fn from(v: String) -> Self {
        Self::String(v)
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "NULL"),
            Self::Bigint(v) | Self::Datetime(v) => write!(f, "{v}"),
            Self::String(s) | Self::Decimal(s) => write!(f, "{s}"),
            Self::Double(v) => write!(f, "{}", v.0),
            Self::Boolean(b) => write!(f, "{b}"),
            Self::Array(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
            Self::Map(entries) => {
                write!(f, "{{")?;
                for (i, (k, v)) in entries.iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    write!(f, "{k}:{v}")?;
                }
                write!(f, "}}")
            }
        }
    }
}

/// One flat record from the upstream source: `[key fields][value fields]`.
pub type Tuple = Vec<Field>;

/// A schema-bound, reusable record buffer.
#[derive(Clone, Debug, PartialEq)]
pub struct Record {
    schema: Arc<Schema>,
    fields: Vec<Field>,
}

impl Record {
    /// A holder for `schema` with every field set to `Null`.
    #[must_use]
    pub fn new(schema: Arc<Schema>) -> Self {
        let fields = vec![Field::Null; schema.len()];
        Self { schema, fields }
    }

    /// Build a record from owned values, checking the width against the schema.
    ///
    /// # Errors
    ///
    /// Returns [`ReduceError::MalformedTuple`] if `fields` has the wrong width.
    pub fn from_fields(schema: Arc<Schema>, fields: Vec<Field>) -> ReduceResult<Self> {
        check_width(schema.len(), fields.len())?;
        Ok(Self { schema, fields })
    }

    #[must_use]
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    #[must_use]
    pub fn column_count(&self) -> usize {
        self.fields.len()
    }

    #[must_use]
    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    #[must_use]
    pub fn get(&self, idx: usize) -> Option<&Field> {
        self.fields.get(idx)
    }

    #[must_use]
    pub fn get_by_name(&self, name: &str) -> Option<&Field> {
        self.schema.index_of(name).and_then(|i| self.fields.get(i))
    }

    /// Overwrite one field.
    ///
    /// # Errors
    ///
    /// Returns [`ReduceError::MalformedTuple`] if `idx` is out of range.
    pub fn set(&mut self, idx: usize, value: impl Into<Field>) -> ReduceResult<()> {
        let width = self.fields.len();
        let slot = self.fields.get_mut(idx).ok_or(ReduceError::MalformedTuple {
            expected: width,
            actual: idx.saturating_add(1),
        })?;
        *slot = value.into();
        Ok(())
    }

    /// Overwrite one field by column name.
    ///
    /// # Errors
    ///
    /// Returns [`ReduceError::Config`] if the schema has no such column.
    pub fn set_by_name(&mut self, name: &str, value: impl Into<Field>) -> ReduceResult<()> {
        let idx = self
            .schema
            .index_of(name)
            .ok_or_else(|| ReduceError::config(format!("no column named '{name}'")))?;
        self.set(idx, value)
    }

    /// Overwrite every field from `values`, moving them in and reusing the buffer.
    ///
    /// # Errors
    ///
    /// Returns [`ReduceError::MalformedTuple`] if the iterator yields the wrong
    /// number of values. The holder is left cleared to `Null` in that case.
    pub fn assign<I>(&mut self, values: I) -> ReduceResult<()>
    where
        I: IntoIterator<Item = Field>,
    {
        self.fields.clear();
        self.fields.extend(values);
        let actual = self.fields.len();
        if let Err(e) = check_width(self.schema.len(), actual) {
            self.fields.clear();
            self.fields.resize(self.schema.len(), Field::Null);
            return Err(e);
        }
        Ok(())
    }

    /// An owned copy that stays valid after the holder is overwritten.
    #[must_use]
    pub fn snapshot(&self) -> Record {
        self.clone()
    }

    #[must_use]
    pub fn into_fields(self) -> Vec<Field> {
        self.fields
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(")?;
        for (i, v) in self.fields.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{v}")?;
        }
        write!(f, ")")
    }
}

fn check_width(expected: usize, actual: usize) -> ReduceResult<()> {
    if expected == actual {
        Ok(())
    } else {
        Err(ReduceError::MalformedTuple { expected, actual })
    }
}
