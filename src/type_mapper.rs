//! Column type to wire type mapping, used when chaining two stages.
//!
//! Primitive tags come from a fixed table; array and map tags are synthesized
//! from the element tags (`ArrayInteger`, `MapStringDouble`, ...).

use crate::error::{ReduceError, ReduceResult};
use crate::schema::{Column, FieldType, Schema};
use std::fmt;

/// Wire tag for a primitive column.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PrimitiveTag {
    Integer,
    String,
    Double,
    Bool,
    Datetime,
    Decimal,
}

impl PrimitiveTag {
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Integer => "Integer",
            Self::String => "String",
            Self::Double => "Double",
            Self::Bool => "Bool",
            Self::Datetime => "Datetime",
            Self::Decimal => "Decimal",
        }
    }
}

/// Wire type of a column.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum WireType {
    Primitive(PrimitiveTag),
    Array(PrimitiveTag),
    Map(PrimitiveTag, PrimitiveTag),
}

impl WireType {
    #[must_use]
    pub fn name(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for WireType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Primitive(t) => write!(f, "{}", t.name()),
            Self::Array(e) => write!(f, "Array{}", e.name()),
            Self::Map(k, v) => write!(f, "Map{}{}", k.name(), v.name()),
        }
    }
}

fn primitive_tag(ty: &FieldType) -> ReduceResult<PrimitiveTag> {
    match ty {
        FieldType::Bigint => Ok(PrimitiveTag::Integer),
        FieldType::String => Ok(PrimitiveTag::String),
        FieldType::Double => Ok(PrimitiveTag::Double),
        FieldType::Boolean => Ok(PrimitiveTag::Bool),
        FieldType::Datetime => Ok(PrimitiveTag::Datetime),
        FieldType::Decimal => Ok(PrimitiveTag::Decimal),
        other => Err(ReduceError::UnsupportedType(other.to_string())),
    }
}

/// Map a column to its wire type.
///
/// # Errors
///
/// Returns [`ReduceError::UnsupportedType`] for primitives outside the table,
/// including nested parameterized element types.
///
/// ```
/// use ironreduce::schema::{Column, FieldType};
/// use ironreduce::type_mapper::wire_type;
///
/// let col = Column::new("m", FieldType::map_of(FieldType::String, FieldType::Bigint));
/// assert_eq!(wire_type(&col).unwrap().name(), "MapStringInteger");
/// ```
pub fn wire_type(column: &Column) -> ReduceResult<WireType> {
    match &column.ty {
        FieldType::Array(element) => Ok(WireType::Array(primitive_tag(element)?)),
        FieldType::Map(key, value) => Ok(WireType::Map(primitive_tag(key)?, primitive_tag(value)?)),
        ty => Ok(WireType::Primitive(primitive_tag(ty)?)),
    }
}

/// Wire types for every column of `schema`, in order.
///
/// # Errors
///
/// Fails on the first unsupported column.
pub fn wire_types(schema: &Schema) -> ReduceResult<Vec<WireType>> {
    schema.columns().iter().map(wire_type).collect()
}

/// Copy `src` under a new name, keeping type, parameters and comment.
#[must_use]
pub fn rename_column(name: impl Into<String>, src: &Column) -> Column {
    Column {
        name: name.into(),
        ..src.clone()
    }
}

#[must_use]
pub fn clone_column(src: &Column) -> Column {
    src.clone()
}

/// Name of the leading partition column in pipelined output.
pub const PARTITION_COLUMN: &str = "__partition__";

/// Schema of a stage's emitted rows when it feeds a further stage through
/// inner framing: `[partition?][key][value]` followed by the wrapped
/// downstream schema. Also returns the offset at which the wrapped part starts.
///
/// # Errors
///
/// Returns [`ReduceError::UnsupportedType`] if any column has no wire type.
pub fn assemble_inner_schema(
    key: &Schema,
    value: &Schema,
    partitioned: bool,
    wrapped: &Schema,
) -> ReduceResult<(Schema, usize)> {
    let mut out = Schema::default();
    if partitioned {
        out.push(Column::new(PARTITION_COLUMN, FieldType::Bigint));
    }
    for col in key.columns().iter().chain(value.columns()) {
        wire_type(col)?;
        out.push(clone_column(col));
    }
    let offset = out.len();
    for (i, col) in wrapped.columns().iter().enumerate() {
        wire_type(col)?;
        if out.index_of(&col.name).is_some() {
            out.push(rename_column(format!("{}_{i}", col.name), col));
        } else {
            out.push(clone_column(col));
        }
    }
    Ok((out, offset))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn primitives_follow_the_fixed_table() {
        let cases = [
            (FieldType::Bigint, "Integer"),
            (FieldType::String, "String"),
            (FieldType::Double, "Double"),
            (FieldType::Boolean, "Bool"),
            (FieldType::Datetime, "Datetime"),
            (FieldType::Decimal, "Decimal"),
        ];
        for (ty, tag) in cases {
            assert_eq!(wire_type(&Column::new("c", ty)).unwrap().name(), tag);
        }
    }

    #[test]
    fn array_tag_prefixes_element() {
        let col = Column::new("a", FieldType::array_of(FieldType::Double));
        assert_eq!(wire_type(&col).unwrap(), WireType::Array(PrimitiveTag::Double));
        assert_eq!(wire_type(&col).unwrap().name(), "ArrayDouble");
    }

    #[test]
    fn unsupported_types_are_rejected() {
        let col = Column::new("s", FieldType::Other("struct".into()));
        assert!(matches!(wire_type(&col), Err(ReduceError::UnsupportedType(t)) if t == "STRUCT"));

        let nested = Column::new("n", FieldType::array_of(FieldType::array_of(FieldType::Bigint)));
        assert!(wire_type(&nested).is_err());
    }

    #[test]
    fn rename_keeps_type_and_comment() {
        let src = Column::new("old", FieldType::map_of(FieldType::String, FieldType::Bigint))
            .with_comment("counts");
        let renamed = rename_column("new", &src);
        assert_eq!(renamed.name, "new");
        assert_eq!(renamed.ty, src.ty);
        assert_eq!(renamed.comment.as_deref(), Some("counts"));
        assert_eq!(clone_column(&src), src);
    }

    #[test]
    fn inner_schema_places_wrapped_columns_after_payload() {
        let key = Schema::of(&[("k", FieldType::String)]);
        let value = Schema::of(&[("v", FieldType::Bigint)]);
        let wrapped = Schema::of(&[("k", FieldType::String), ("total", FieldType::Double)]);

        let (schema, offset) = assemble_inner_schema(&key, &value, true, &wrapped).unwrap();
        assert_eq!(offset, 3);
        let names: Vec<_> = schema.columns().iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec![PARTITION_COLUMN, "k", "v", "k_0", "total"]);
    }
}
