use anyhow::Result;
use ironreduce::router::{InnerFraming, OutputRouter};
use ironreduce::*;
use std::sync::Arc;

fn kv(k: &str, v: i64) -> Result<(Record, Record)> {
    let ks = Arc::new(Schema::of(&[("k", FieldType::String)]));
    let vs = Arc::new(Schema::of(&[("v", FieldType::Bigint)]));
    Ok((
        Record::from_fields(ks, vec![Field::from(k)])?,
        Record::from_fields(vs, vec![Field::from(v)])?,
    ))
}

#[test]
fn pipelined_without_partitioner_has_no_tag() -> Result<()> {
    let (k, v) = kv("a", 1)?;
    let mut r = OutputRouter::new(None, 4, None);
    let out = r.route_pipelined(&k, &v)?;
    assert_eq!(out.fields, vec![Field::from("a"), Field::from(1)]);
    assert_eq!(out.label, DEFAULT_LABEL);
    Ok(())
}

#[test]
fn partition_tag_leads_the_record() -> Result<()> {
    let (k, v) = kv("a", 1)?;
    let mut r = OutputRouter::new(Some(Box::new(|_: &Record, _: &Record, _: u32| 2_i64)), 4, None);
    let out = r.route_pipelined(&k, &v)?;
    assert_eq!(out.fields[0], Field::Bigint(2));
    assert_eq!(out.fields.len(), 3);
    Ok(())
}

#[test]
fn out_of_range_partitions_fail() -> Result<()> {
    let (k, v) = kv("a", 1)?;
    for bad in [-1_i64, 4, 5] {
        let mut r = OutputRouter::new(Some(Box::new(move |_: &Record, _: &Record, _: u32| bad)), 4, None);
        assert!(matches!(
            r.route_pipelined(&k, &v),
            Err(ReduceError::InvalidPartition { partition, total: 4 }) if partition == bad
        ));
    }
    Ok(())
}

#[test]
fn hash_partitioner_spreads_within_range() -> Result<()> {
    let mut p = HashPartitioner;
    for i in 0..50 {
        let (k, v) = kv(&format!("key{i}"), i)?;
        let part = p.partition(&k, &v, 7);
        assert!((0..7).contains(&part));
    }
    Ok(())
}

#[test]
fn inner_framing_places_payloads_by_offset() -> Result<()> {
    let (k, v) = kv("a", 1)?;
    let framing = InnerFraming { offset: 2, width: 5 };
    let mut r = OutputRouter::new(None, 1, Some(framing));

    let piped = r.route_pipelined(&k, &v)?;
    assert_eq!(piped.label, INNER_OUTPUT_LABEL);
    assert_eq!(
        piped.fields,
        vec![
            Field::from(DEFAULT_LABEL),
            Field::Bigint(0),
            Field::from("a"),
            Field::from(1),
            Field::Null,
            Field::Null,
            Field::Null,
        ]
    );

    let fin = r.route_final(&k, "totals")?;
    assert_eq!(fin.fields[0], Field::from("totals"));
    assert_eq!(fin.fields[1], Field::Bigint(2));
    assert_eq!(
        &fin.fields[2..],
        &[Field::Null, Field::Null, Field::from("a"), Field::Null, Field::Null]
    );
    Ok(())
}

#[test]
fn inner_framing_rejects_oversized_payload() -> Result<()> {
    let (k, v) = kv("a", 1)?;
    let mut r = OutputRouter::new(None, 1, Some(InnerFraming { offset: 1, width: 1 }));
    let err = r.route_pipelined(&k, &v).unwrap_err();
    assert!(matches!(err, ReduceError::FramedPayloadTooWide { slot: 1, actual: 2 }));
    assert!(!err.to_string().contains("input tuple"));
    assert!(matches!(
        r.route_final(&k, "totals"),
        Err(ReduceError::FramedPayloadTooWide { slot: 0, actual: 1 })
    ));
    Ok(())
}

#[test]
fn inner_framing_offset_past_width_is_an_error() -> Result<()> {
    let (k, v) = kv("a", 1)?;
    let mut r = OutputRouter::new(None, 1, Some(InnerFraming { offset: 4, width: 2 }));
    assert!(matches!(r.route_final(&k, "totals"), Err(ReduceError::Config(m)) if m.contains("offset 4")));
    assert!(matches!(r.route_pipelined(&k, &v), Err(ReduceError::Config(_))));
    Ok(())
}
