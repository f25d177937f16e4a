//! Column and schema descriptors for key, value and output records.
//!
//! A [`Schema`] is an ordered list of [`Column`]s. Parameterized types are
//! limited to single-element sequences ([`FieldType::Array`]) and key/value
//! mappings ([`FieldType::Map`]); everything else is a primitive.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The declared type of a column.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    Bigint,
    String,
    Double,
    Boolean,
    Datetime,
    Decimal,
    /// A type the engine can carry but has no wire representation for.
    Other(String),
    Array(Box<FieldType>),
    Map(Box<FieldType>, Box<FieldType>),
}

impl FieldType {
    #[must_use]
    pub fn array_of(element: FieldType) -> Self {
        Self::Array(Box::new(element))
    }

    #[must_use]
    pub fn map_of(key: FieldType, value: FieldType) -> Self {
        Self::Map(Box::new(key), Box::new(value))
    }

    #[must_use]
    pub fn is_primitive(&self) -> bool {
        !matches!(self, Self::Array(_) | Self::Map(..))
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bigint => write!(f, "BIGINT"),
            Self::String => write!(f, "STRING"),
            Self::Double => write!(f, "DOUBLE"),
            Self::Boolean => write!(f, "BOOLEAN"),
            Self::Datetime => write!(f, "DATETIME"),
            Self::Decimal => write!(f, "DECIMAL"),
            Self::Other(name) => write!(f, "{}", name.to_uppercase()),
            Self::Array(e) => write!(f, "ARRAY<{e}>"),
            Self::Map(k, v) => write!(f, "MAP<{k},{v}>"),
        }
    }
}

/// A named, typed column.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: FieldType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

impl Column {
    pub fn new(name: impl Into<String>, ty: FieldType) -> Self {
        Self {
            name: name.into(),
            ty,
            comment: None,
        }
    }

    #[must_use]
    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }
}

/// Ordered list of columns.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Schema {
    columns: Vec<Column>,
}

impl Schema {
    #[must_use]
    pub fn new(columns: Vec<Column>) -> Self {
        Self { columns }
    }

    /// Build a schema from `(name, type)` pairs.
    ///
    /// ```
    /// use ironreduce::schema::{FieldType, Schema};
    ///
    /// let s = Schema::of(&[("word", FieldType::String), ("n", FieldType::Bigint)]);
    /// assert_eq!(s.len(), 2);
    /// assert_eq!(s.index_of("n"), Some(1));
    /// ```
    #[must_use]
    pub fn of(columns: &[(&str, FieldType)]) -> Self {
        Self::new(
            columns
                .iter()
                .map(|(name, ty)| Column::new(*name, ty.clone()))
                .collect(),
        )
    }

    #[must_use]
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    #[must_use]
    pub fn column(&self, idx: usize) -> Option<&Column> {
        self.columns.get(idx)
    }

    #[must_use]
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    pub fn push(&mut self, column: Column) {
        self.columns.push(column);
    }

    /// Concatenate `self` and `other` into a new schema.
    #[must_use]
    pub fn concat(&self, other: &Schema) -> Schema {
        let mut columns = Vec::with_capacity(self.len() + other.len());
        columns.extend(self.columns.iter().cloned());
        columns.extend(other.columns.iter().cloned());
        Schema { columns }
    }
}

impl FromIterator<Column> for Schema {
    fn from_iter<I: IntoIterator<Item = Column>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}
