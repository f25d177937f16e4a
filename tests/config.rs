use anyhow::Result;
use ironreduce::testing::*;
use ironreduce::*;
use std::io::Write;
use tempfile::NamedTempFile;

const PIPELINED: &str = r#"{
    "key_schema": [{"name": "word", "type": "string"}],
    "value_schema": [{"name": "n", "type": "bigint"}],
    "grouping_columns": ["word"],
    "num_partitions": 4,
    "stage": {
        "output_key_schema": [{"name": "word", "type": "string"}],
        "output_value_schema": [{"name": "n", "type": "bigint"}]
    },
    "sampler": {"factor": 4}
}"#;

#[test]
fn loads_task_config_from_file() -> Result<()> {
    let mut file = NamedTempFile::new()?;
    file.write_all(PIPELINED.as_bytes())?;

    let config = TaskConfig::from_json_file(file.path())?;
    assert!(config.forwards());
    assert_eq!(config.num_partitions, 4);
    assert!(config.has_label(DEFAULT_LABEL));
    assert_eq!(config.sampler.factor, 4);
    assert_eq!(config.sampler.linear_step, SamplerPolicy::default().linear_step);

    let sink = CollectingSink::new();
    let mut session = ReduceSession::builder(config)
        .source(words_tuples().into_iter())
        .sink(sink.clone())
        .partitioner(HashPartitioner)
        .instrumentation(NoopInstrumentation)
        .build()?;
    while session.advance_group()? {
        let Some((key, mut values, out)) = session.group_mut() else {
            break;
        };
        while let Some(v) = values.next_value()? {
            out.write_pair(key, v)?;
        }
    }
    assert_eq!(sink.len(), 5);
    Ok(())
}

#[test]
fn saved_config_reloads_identically() -> Result<()> {
    let config = labeled_words_config().with_grouping_columns(["word"]);
    let mut file = NamedTempFile::new()?;
    file.write_all(config.to_json_string()?.as_bytes())?;
    assert_eq!(TaskConfig::from_json_file(file.path())?, config);
    Ok(())
}

#[test]
fn missing_file_is_a_config_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = TaskConfig::from_json_file(dir.path().join("absent.json")).unwrap_err();
    assert!(err.is_fatal_config());
}

#[test]
fn invalid_wiring_fails_at_session_construction() {
    let bad = words_config().with_grouping_columns(["nope"]);
    let err = ReduceSession::builder(bad)
        .source(words_tuples().into_iter())
        .sink(CollectingSink::new())
        .build()
        .err()
        .unwrap();
    assert!(matches!(err, ReduceError::Config(ref m) if m.contains("nope")));
}

#[test]
fn unsupported_framed_type_fails_at_session_construction() {
    let config = pipelined_words_config(2).with_inner_output(Schema::of(&[(
        "blob",
        FieldType::Other("BINARY".into()),
    )]));
    let err = ReduceSession::builder(config)
        .source(words_tuples().into_iter())
        .sink(CollectingSink::new())
        .build()
        .err()
        .unwrap();
    assert!(matches!(err, ReduceError::UnsupportedType(_)));
    assert!(err.is_fatal_config());
}

#[test]
fn inner_output_without_packaged_schema_fails_at_session_construction() {
    let err = ReduceSession::builder(words_config().with_inner_output(Schema::default()))
        .source(words_tuples().into_iter())
        .sink(CollectingSink::new())
        .build()
        .err()
        .unwrap();
    assert!(matches!(err, ReduceError::Config(ref m) if m.contains("packaged output schema")));
    assert!(err.is_fatal_config());
}

#[test]
fn narrow_packaged_schema_fails_at_session_construction() {
    let config = labeled_words_config().with_inner_output(Schema::of(&[("line", FieldType::String)]));
    let err = ReduceSession::builder(config)
        .source(words_tuples().into_iter())
        .sink(CollectingSink::new())
        .build()
        .err()
        .unwrap();
    assert!(matches!(err, ReduceError::Config(ref m) if m.contains("'totals'")));
}
