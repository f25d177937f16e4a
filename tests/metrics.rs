use anyhow::Result;
use ironreduce::testing::*;
use ironreduce::*;
use serde_json::Value;

#[test]
fn saved_metrics_reload_as_json() -> Result<()> {
    let collector = MetricsCollector::new();
    let session = ReduceSession::builder(labeled_words_config())
        .source(words_tuples().into_iter())
        .sink(CollectingSink::new())
        .metrics(collector.clone())
        .instrumentation(NoopInstrumentation)
        .build()?;
    run_reducer(session, &mut CombiningReducer::new(CountValues))?;

    let dir = tempfile::tempdir()?;
    let path = dir.path().join("metrics.json");
    collector.save_to_file(&path)?;

    let saved: Value = serde_json::from_str(&std::fs::read_to_string(&path)?)?;
    assert_eq!(saved[metrics::INPUT_KEY_COUNT], serde_json::json!(2));
    assert_eq!(saved[metrics::INPUT_VALUE_COUNT], serde_json::json!(5));
    assert_eq!(saved["output_records.__default__"], serde_json::json!(2));
    assert!(saved["execution_time_ms"].is_u64());
    assert_eq!(saved, collector.to_json());
    Ok(())
}

#[test]
fn unfinished_task_saves_without_execution_time() -> Result<()> {
    let collector = MetricsCollector::new();
    collector.record_start();
    collector.increment_counter(&metrics::output_counter("totals"), 4);

    let dir = tempfile::tempdir()?;
    let path = dir.path().join("partial.json");
    collector.save_to_file(&path)?;
    collector.report();

    let saved: Value = serde_json::from_str(&std::fs::read_to_string(&path)?)?;
    assert_eq!(saved["output_records.totals"], serde_json::json!(4));
    assert!(saved.get("execution_time_ms").is_none());
    Ok(())
}

#[test]
fn saving_into_a_missing_directory_fails() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let err = MetricsCollector::new()
        .save_to_file(dir.path().join("absent").join("metrics.json"))
        .unwrap_err();
    assert!(err.downcast_ref::<std::io::Error>().is_some());
    Ok(())
}
