//! Assertion helpers for grouped output.

use crate::error::ReduceResult;
use crate::record::Field;
use crate::session::ReduceSession;

/// A group as plain data: key fields, then each value's fields.
pub type Group = (Vec<Field>, Vec<Vec<Field>>);

/// Expected single-column group, for use with [`assert_groups_equal`].
///
/// # Example
///
/// ```
/// use ironreduce::record::Field;
/// use ironreduce::testing::group;
///
/// let g = group("A", [1, 2]);
/// assert_eq!(g.0, vec![Field::from("A")]);
/// assert_eq!(g.1.len(), 2);
/// ```
pub fn group<V: Into<Field>>(key: impl Into<Field>, values: impl IntoIterator<Item = V>) -> Group {
    (
        vec![key.into()],
        values.into_iter().map(|v| vec![v.into()]).collect(),
    )
}

/// Drive `session` to exhaustion, copying every key and every value.
///
/// # Errors
///
/// Whatever the session reports while advancing or reading values.
pub fn collect_groups(session: &mut ReduceSession) -> ReduceResult<Vec<Group>> {
    let mut groups = Vec::new();
    while session.advance_group()? {
        let Some(key) = session.current_key().map(|k| k.fields().to_vec()) else {
            break;
        };
        let values = session
            .values_of_current_group()
            .snapshot_all()?
            .into_iter()
            .map(crate::record::Record::into_fields)
            .collect();
        groups.push((key, values));
    }
    Ok(groups)
}

/// Assert that two group sequences are equal in order and content.
///
/// # Panics
///
/// Panics if the sequences differ in length, keys or values.
pub fn assert_groups_equal(actual: &[Group], expected: &[Group]) {
    let keys = |gs: &[Group]| gs.iter().map(|g| g.0.clone()).collect::<Vec<_>>();
    assert_eq!(
        actual.len(),
        expected.len(),
        "Group count mismatch:\n  Expected keys: {:?}\n  Actual keys: {:?}",
        keys(expected),
        keys(actual)
    );

    for (i, (a, e)) in actual.iter().zip(expected).enumerate() {
        assert_eq!(a.0, e.0, "Key mismatch at group {i}:\n  Expected: {:?}\n  Actual: {:?}", e.0, a.0);
        assert_eq!(
            a.1, e.1,
            "Value mismatch in group {i} (key {:?}):\n  Expected: {:?}\n  Actual: {:?}",
            e.0, e.1, a.1
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[should_panic(expected = "Value mismatch in group 0")]
    fn reports_value_mismatch() {
        assert_groups_equal(&[group("A", [1])], &[group("A", [2])]);
    }

    #[test]
    #[should_panic(expected = "Group count mismatch")]
    fn reports_missing_groups() {
        assert_groups_equal(&[], &[group("A", [1])]);
    }
}
