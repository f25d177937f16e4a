//! Task configuration for a reduce session.
//!
//! A [`TaskConfig`] describes the key/value split of the incoming tuples, the
//! declared output labels, and, for a reducer that feeds a further stage, that
//! stage's key/value schemas. It is plain data and loads from JSON:
//!
//! ```
//! use ironreduce::config::TaskConfig;
//!
//! let cfg = TaskConfig::from_json_str(r#"{
//!     "key_schema": [{"name": "word", "type": "string"}],
//!     "value_schema": [{"name": "n", "type": "bigint"}],
//!     "outputs": [{"label": "counts"}]
//! }"#).unwrap();
//! assert!(cfg.has_label("counts"));
//! assert!(!cfg.forwards());
//! ```

use crate::error::{DEFAULT_LABEL, ReduceError, ReduceResult};
use crate::router::InnerFraming;
use crate::sampler::SamplerPolicy;
use crate::schema::Schema;
use crate::type_mapper::{assemble_inner_schema, wire_types};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use std::sync::OnceLock;

/// A declared output label, optionally with the schema of its records.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputDecl {
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<Schema>,
}

impl OutputDecl {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            schema: None,
        }
    }

    #[must_use]
    pub fn with_schema(mut self, schema: Schema) -> Self {
        self.schema = Some(schema);
        self
    }
}

/// Wiring of a reducer whose output feeds another processing stage.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageConfig {
    pub output_key_schema: Schema,
    pub output_value_schema: Schema,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TaskConfig {
    pub key_schema: Schema,
    pub value_schema: Schema,
    /// Key columns that define a group. `None` means every key column.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grouping_columns: Option<Vec<String>>,
    #[serde(default = "default_outputs")]
    pub outputs: Vec<OutputDecl>,
    /// Total downstream partitions handed to the partitioner.
    #[serde(default = "default_partitions")]
    pub num_partitions: u32,
    /// Present when this reducer forwards to a further stage.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stage: Option<StageConfig>,
    /// Frame every emitted row for a chained downstream stage.
    #[serde(default)]
    pub inner_output: bool,
    /// Schema of the wrapped downstream output under inner framing.
    #[serde(default)]
    pub packaged_output_schema: Schema,
    #[serde(default)]
    pub sampler: SamplerPolicy,
}

fn default_outputs() -> Vec<OutputDecl> {
    vec![OutputDecl::new(DEFAULT_LABEL)]
}

const fn default_partitions() -> u32 {
    1
}

fn label_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[A-Za-z0-9_][A-Za-z0-9_.\-]*$").expect("static regex"))
}

impl TaskConfig {
    /// A terminal-stage config with the default output label.
    #[must_use]
    pub fn new(key_schema: Schema, value_schema: Schema) -> Self {
        Self {
            key_schema,
            value_schema,
            grouping_columns: None,
            outputs: default_outputs(),
            num_partitions: default_partitions(),
            stage: None,
            inner_output: false,
            packaged_output_schema: Schema::default(),
            sampler: SamplerPolicy::default(),
        }
    }

    #[must_use]
    pub fn with_grouping_columns<S: Into<String>>(mut self, columns: impl IntoIterator<Item = S>) -> Self {
        self.grouping_columns = Some(columns.into_iter().map(Into::into).collect());
        self
    }

    /// Replace the declared outputs.
    #[must_use]
    pub fn with_outputs(mut self, outputs: Vec<OutputDecl>) -> Self {
        self.outputs = outputs;
        self
    }

    #[must_use]
    pub fn with_stage(mut self, stage: StageConfig, num_partitions: u32) -> Self {
        self.stage = Some(stage);
        self.num_partitions = num_partitions;
        self
    }

    #[must_use]
    pub fn with_inner_output(mut self, packaged_output_schema: Schema) -> Self {
        self.inner_output = true;
        self.packaged_output_schema = packaged_output_schema;
        self
    }

    #[must_use]
    pub fn with_sampler(mut self, sampler: SamplerPolicy) -> Self {
        self.sampler = sampler;
        self
    }

    /// # Errors
    ///
    /// [`ReduceError::Config`] on malformed JSON or an invalid configuration.
    pub fn from_json_str(s: &str) -> ReduceResult<Self> {
        let cfg: Self = serde_json::from_str(s)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// # Errors
    ///
    /// [`ReduceError::Config`] if the file cannot be read or does not parse.
    pub fn from_json_file(path: impl AsRef<Path>) -> ReduceResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| ReduceError::config(format!("read {}: {e}", path.display())))?;
        Self::from_json_str(&text)
    }

    /// # Errors
    ///
    /// [`ReduceError::Config`] if serialization fails.
    pub fn to_json_string(&self) -> ReduceResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Width of one upstream tuple.
    #[must_use]
    pub fn tuple_width(&self) -> usize {
        self.key_schema.len() + self.value_schema.len()
    }

    /// True if this reducer forwards key/value pairs to a further stage.
    #[must_use]
    pub fn forwards(&self) -> bool {
        self.stage.is_some()
    }

    #[must_use]
    pub fn has_label(&self, label: &str) -> bool {
        self.outputs.iter().any(|o| o.label == label)
    }

    /// Layout of inner-framed rows, if inner framing is enabled.
    ///
    /// # Errors
    ///
    /// [`ReduceError::UnsupportedType`] if a framed column has no wire type.
    pub fn inner_framing(&self, partitioned: bool) -> ReduceResult<Option<InnerFraming>> {
        if !self.inner_output {
            return Ok(None);
        }
        let (width, offset) = match &self.stage {
            Some(stage) => {
                let (schema, offset) = assemble_inner_schema(
                    &stage.output_key_schema,
                    &stage.output_value_schema,
                    partitioned,
                    &self.packaged_output_schema,
                )?;
                (schema.len(), offset)
            }
            None => {
                wire_types(&self.packaged_output_schema)?;
                (self.packaged_output_schema.len(), 0)
            }
        };
        Ok(Some(InnerFraming { offset, width }))
    }

    /// Check the configuration for wiring mistakes.
    ///
    /// # Errors
    ///
    /// [`ReduceError::Config`] describing the first problem found.
    pub fn validate(&self) -> ReduceResult<()> {
        if self.key_schema.is_empty() {
            return Err(ReduceError::config("key schema must have at least one column"));
        }
        if let Some(cols) = &self.grouping_columns {
            if cols.is_empty() {
                return Err(ReduceError::config("grouping columns must not be empty"));
            }
            if let Some(missing) = cols.iter().find(|c| self.key_schema.index_of(c).is_none()) {
                return Err(ReduceError::config(format!(
                    "grouping column '{missing}' is not a key column"
                )));
            }
        }
        if self.outputs.is_empty() {
            return Err(ReduceError::config("at least one output label must be declared"));
        }
        let mut seen = HashSet::new();
        for out in &self.outputs {
            if !label_pattern().is_match(&out.label) {
                return Err(ReduceError::config(format!("invalid output label '{}'", out.label)));
            }
            if !seen.insert(out.label.as_str()) {
                return Err(ReduceError::config(format!("duplicate output label '{}'", out.label)));
            }
        }
        if self.num_partitions == 0 {
            return Err(ReduceError::config("num_partitions must be at least 1"));
        }
        self.sampler.validate().map_err(ReduceError::Config)?;
        if self.inner_output {
            self.validate_inner_output()?;
        }
        Ok(())
    }

    /// Under inner framing every final row lands in a slot as wide as the
    /// packaged output schema.
    fn validate_inner_output(&self) -> ReduceResult<()> {
        let slot = self.packaged_output_schema.len();
        if slot == 0 && !self.forwards() {
            return Err(ReduceError::config(
                "inner output needs a packaged output schema when the reducer does not forward",
            ));
        }
        for out in &self.outputs {
            let width = out.schema.as_ref().map_or(0, Schema::len);
            if width > slot {
                return Err(ReduceError::config(format!(
                    "output label '{}' has {width} columns but the packaged output schema holds {slot}",
                    out.label
                )));
            }
        }
        Ok(())
    }
}
