use anyhow::Result;
use ironreduce::testing::*;
use ironreduce::*;

#[derive(Default)]
struct Tracing {
    calls: Vec<String>,
}

impl Reducer for Tracing {
    fn setup(&mut self, _ctx: &mut TaskOutput) -> Result<()> {
        self.calls.push("setup".into());
        Ok(())
    }

    fn reduce(&mut self, key: &Record, values: &mut Values<'_>, _ctx: &mut TaskOutput) -> Result<()> {
        // Read only the first value; the session skips the rest.
        let first = values.next_value()?.and_then(|v| v.get(0).cloned());
        self.calls.push(format!("{}:{}", key, first.unwrap_or(Field::Null)));
        Ok(())
    }

    fn cleanup(&mut self, _ctx: &mut TaskOutput) -> Result<()> {
        self.calls.push("cleanup".into());
        Ok(())
    }
}

#[test]
fn lifecycle_runs_in_order() -> Result<()> {
    let mut reducer = Tracing::default();
    let summary = run_reducer(words_session(CollectingSink::new())?, &mut reducer)?;
    assert_eq!(reducer.calls, vec!["setup", "(A):1", "(B):3", "cleanup"]);
    assert_eq!(summary.input_keys, 2);
    assert_eq!(summary.input_values, 5);
    assert_eq!(summary.output_records, 0);
    Ok(())
}

#[test]
fn empty_input_still_runs_setup_and_cleanup() -> Result<()> {
    let session = ReduceSession::builder(words_config())
        .source(MemorySource::new(vec![]))
        .sink(CollectingSink::new())
        .instrumentation(NoopInstrumentation)
        .memory_probe(NullMemoryProbe)
        .build()?;
    let mut reducer = Tracing::default();
    let summary = run_reducer(session, &mut reducer)?;
    assert_eq!(reducer.calls, vec!["setup", "cleanup"]);
    assert_eq!(summary.input_keys, 0);
    Ok(())
}

#[test]
fn engine_errors_can_be_downcast() -> Result<()> {
    struct WritesExtra;
    impl Reducer for WritesExtra {
        fn reduce(&mut self, key: &Record, _values: &mut Values<'_>, ctx: &mut TaskOutput) -> Result<()> {
            ctx.write_labeled(key, "extra")?;
            Ok(())
        }
    }

    let sink = CollectingSink::new();
    let err = run_reducer(words_session(sink.clone())?, &mut WritesExtra).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<ReduceError>(),
        Some(ReduceError::UnknownLabel(l)) if l == "extra"
    ));
    assert!(sink.is_empty());
    Ok(())
}

#[test]
fn count_per_group() -> Result<()> {
    let sink = CollectingSink::new();
    let summary = run_reducer(words_session(sink.clone())?, &mut CombiningReducer::new(CountValues))?;
    assert_eq!(summary.output_records, 2);
    let rows: Vec<_> = sink.records().into_iter().map(|r| r.fields).collect();
    assert_eq!(
        rows,
        vec![
            vec![Field::from("A"), Field::from(2)],
            vec![Field::from("B"), Field::from(3)],
        ]
    );
    Ok(())
}

#[test]
fn sum_per_group_on_a_named_label() -> Result<()> {
    let sink = CollectingSink::new();
    let session = ReduceSession::builder(labeled_words_config())
        .source(words_tuples().into_iter())
        .sink(sink.clone())
        .instrumentation(NoopInstrumentation)
        .build()?;
    let mut reducer = CombiningReducer::new(SumColumn::bigint("n")).with_label("totals");
    run_reducer(session, &mut reducer)?;

    let totals = sink.with_label("totals");
    assert_eq!(totals[0].fields, vec![Field::from("A"), Field::from(3)]);
    assert_eq!(totals[1].fields, vec![Field::from("B"), Field::from(12)]);
    Ok(())
}

#[test]
fn combiner_rejects_undeclared_label_at_setup() -> Result<()> {
    let sink = CollectingSink::new();
    let mut reducer = CombiningReducer::new(CountValues).with_label("missing");
    let err = run_reducer(words_session(sink.clone())?, &mut reducer).unwrap_err();
    assert!(err.to_string().contains("missing"));
    assert!(sink.is_empty());
    Ok(())
}

#[test]
fn combiner_forwards_pairs_when_pipelined() -> Result<()> {
    let sink = CollectingSink::new();
    let session = ReduceSession::builder(pipelined_words_config(2))
        .source(words_tuples().into_iter())
        .sink(sink.clone())
        .partitioner(|key: &Record, _: &Record, _: u32| {
            i64::from(key.get(0).and_then(Field::as_str) == Some("B"))
        })
        .instrumentation(NoopInstrumentation)
        .build()?;
    run_reducer(session, &mut CombiningReducer::new(SumColumn::double("n")))?;

    let rows: Vec<_> = sink.records().into_iter().map(|r| r.fields).collect();
    assert_eq!(
        rows,
        vec![
            vec![Field::Bigint(0), Field::from("A"), Field::from(3.0)],
            vec![Field::Bigint(1), Field::from("B"), Field::from(12.0)],
        ]
    );
    Ok(())
}

#[test]
fn grouped_sums_follow_grouping_columns() -> Result<()> {
    let sink = CollectingSink::new();
    let session = ReduceSession::builder(payroll_config())
        .source(payroll_tuples().into_iter())
        .sink(sink.clone())
        .instrumentation(NoopInstrumentation)
        .build()?;
    run_reducer(session, &mut CombiningReducer::new(SumColumn::double("salary")))?;

    let rows: Vec<_> = sink.records().into_iter().map(|r| r.fields).collect();
    assert_eq!(
        rows,
        vec![
            vec![Field::from("eng"), Field::from(2023), Field::from(220.5)],
            vec![Field::from("ops"), Field::from(2024), Field::from(90.0)],
        ]
    );
    Ok(())
}
