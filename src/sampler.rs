//! Progress sampling on the pull path.
//!
//! The sampler watches the running value count and fires an instrumentation
//! event when it reaches the current threshold. The threshold then moves forward
//! geometrically (and linearly past a cap), so events thin out as volume grows
//! but never stop. The sampler only reads counters; it never touches a tuple.
//!
//! ```
//! use ironreduce::sampler::SamplerPolicy;
//!
//! let policy = SamplerPolicy { factor: 2, linear_after: 8, linear_step: 8 };
//! let fired: Vec<u64> = policy.thresholds().take(6).collect();
//! assert_eq!(fired, vec![1, 2, 4, 8, 16, 24]);
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

/// Growth law for the sampling threshold.
///
/// While the count is below `linear_after` the next threshold is
/// `count * factor`; past it the threshold advances by `linear_step`. The result
/// is always at least `count + 1`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplerPolicy {
    pub factor: u64,
    pub linear_after: u64,
    pub linear_step: u64,
}

impl Default for SamplerPolicy {
    fn default() -> Self {
        Self {
            factor: 2,
            linear_after: 1 << 20,
            linear_step: 1 << 20,
        }
    }
}

impl SamplerPolicy {
    /// Threshold following a firing at `count`.
    #[must_use]
    pub fn next_threshold(&self, count: u64) -> u64 {
        let next = if count < self.linear_after {
            count.saturating_mul(self.factor)
        } else {
            count.saturating_add(self.linear_step)
        };
        next.max(count.saturating_add(1))
    }

    /// The deterministic sequence of counts at which the sampler fires.
    pub fn thresholds(self) -> impl Iterator<Item = u64> {
        std::iter::successors(Some(1u64), move |&t| {
            let next = self.next_threshold(t);
            (next > t).then_some(next)
        })
    }

    /// # Errors
    ///
    /// Returns a message if the policy could stall or never grow.
    pub fn validate(&self) -> Result<(), String> {
        if self.factor < 2 {
            return Err(format!("sampler factor must be at least 2, got {}", self.factor));
        }
        if self.linear_step == 0 {
            return Err("sampler linear_step must be positive".into());
        }
        Ok(())
    }
}

/// Resident memory at the time of an event.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemorySnapshot {
    pub resident_bytes: u64,
    pub peak_resident_bytes: u64,
}

/// Why an event was emitted.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressStage {
    /// The value count reached the sampling threshold.
    Progress,
    /// The reducer finished.
    TaskEnd,
}

/// One instrumentation event.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressEvent {
    pub stage: ProgressStage,
    pub keys: u64,
    pub values: u64,
    pub memory: MemorySnapshot,
}

impl fmt::Display for ProgressEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.stage {
            ProgressStage::Progress => write!(
                f,
                "after processed {} keys, {} values",
                self.keys, self.values
            )?,
            ProgressStage::TaskEnd => write!(f, "reducer end")?,
        }
        write!(
            f,
            ": resident {} bytes (peak {} bytes)",
            self.memory.resident_bytes, self.memory.peak_resident_bytes
        )
    }
}

/// Receives progress events. Purely observational.
pub trait Instrumentation: Send {
    fn on_event(&mut self, event: &ProgressEvent);
}

/// Logs each event at `info` level.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogInstrumentation;

impl Instrumentation for LogInstrumentation {
    fn on_event(&mut self, event: &ProgressEvent) {
        log::info!("{event}");
    }
}

/// Drops every event.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopInstrumentation;

impl Instrumentation for NoopInstrumentation {
    fn on_event(&mut self, _event: &ProgressEvent) {}
}

/// Reports current resident memory in bytes.
pub trait MemoryProbe: Send {
    fn resident_bytes(&mut self) -> u64;
}

/// Resident memory of the current process, read through `sysinfo`.
#[cfg(feature = "process-memory")]
pub struct ProcessMemoryProbe {
    system: sysinfo::System,
    pid: sysinfo::Pid,
}

#[cfg(feature = "process-memory")]
impl ProcessMemoryProbe {
    #[must_use]
    pub fn new() -> Self {
        Self {
            system: sysinfo::System::new(),
            pid: sysinfo::Pid::from_u32(std::process::id()),
        }
    }
}

#[cfg(feature = "process-memory")]
impl Default for ProcessMemoryProbe {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(feature = "process-memory")]
impl MemoryProbe for ProcessMemoryProbe {
    fn resident_bytes(&mut self) -> u64 {
        self.system
            .refresh_processes(sysinfo::ProcessesToUpdate::Some(&[self.pid]), true);
        self.system.process(self.pid).map_or(0, sysinfo::Process::memory)
    }
}

/// Always reports zero; used when process memory is not compiled in.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullMemoryProbe;

impl MemoryProbe for NullMemoryProbe {
    fn resident_bytes(&mut self) -> u64 {
        0
    }
}

/// The default probe for this build.
#[must_use]
pub fn default_probe() -> Box<dyn MemoryProbe> {
    #[cfg(feature = "process-memory")]
    {
        Box::new(ProcessMemoryProbe::new())
    }
    #[cfg(not(feature = "process-memory"))]
    {
        Box::new(NullMemoryProbe)
    }
}

/// Threshold-driven sampler fed by the input channel.
pub struct ProgressSampler {
    policy: SamplerPolicy,
    next_threshold: u64,
    peak: u64,
    fired: u64,
    sink: Box<dyn Instrumentation>,
    probe: Box<dyn MemoryProbe>,
}

impl ProgressSampler {
    pub fn new(
        policy: SamplerPolicy,
        sink: Box<dyn Instrumentation>,
        probe: Box<dyn MemoryProbe>,
    ) -> Self {
        Self {
            policy,
            next_threshold: 1,
            peak: 0,
            fired: 0,
            sink,
            probe,
        }
    }

    /// A sampler that still tracks thresholds but reports nowhere.
    #[must_use]
    pub fn silent() -> Self {
        Self::new(
            SamplerPolicy::default(),
            Box::new(NoopInstrumentation),
            Box::new(NullMemoryProbe),
        )
    }

    /// Called after every successful pull with the updated counters.
    pub fn observe(&mut self, keys: u64, values: u64) {
        if values != self.next_threshold {
            return;
        }
        self.emit(ProgressStage::Progress, keys, values);
        self.next_threshold = self.policy.next_threshold(values);
    }

    /// Emit the end-of-task event and return the final memory snapshot.
    pub fn finish(&mut self, keys: u64, values: u64) -> MemorySnapshot {
        self.emit(ProgressStage::TaskEnd, keys, values)
    }

    fn emit(&mut self, stage: ProgressStage, keys: u64, values: u64) -> MemorySnapshot {
        let resident = self.probe.resident_bytes();
        self.peak = self.peak.max(resident);
        let memory = MemorySnapshot {
            resident_bytes: resident,
            peak_resident_bytes: self.peak,
        };
        self.fired += 1;
        self.sink.on_event(&ProgressEvent {
            stage,
            keys,
            values,
            memory,
        });
        memory
    }

    #[must_use]
    pub fn next_threshold(&self) -> u64 {
        self.next_threshold
    }

    /// Number of events emitted so far, including the task-end event.
    #[must_use]
    pub fn fired(&self) -> u64 {
        self.fired
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    struct Shared(Arc<Mutex<Vec<ProgressEvent>>>);
    impl Instrumentation for Shared {
        fn on_event(&mut self, event: &ProgressEvent) {
            self.0.lock().unwrap().push(*event);
        }
    }

    struct Stepping(u64);
    impl MemoryProbe for Stepping {
        fn resident_bytes(&mut self) -> u64 {
            self.0 = (self.0 + 100) % 350;
            self.0
        }
    }

    #[test]
    fn default_policy_doubles_then_grows_linearly() {
        let p = SamplerPolicy::default();
        assert_eq!(p.next_threshold(1), 2);
        assert_eq!(p.next_threshold(1 << 19), 1 << 20);
        assert_eq!(p.next_threshold(1 << 20), 2 << 20);
        assert_eq!(p.next_threshold(3 << 20), 4 << 20);
    }

    #[test]
    fn threshold_always_moves_forward() {
        let p = SamplerPolicy {
            factor: 2,
            linear_after: 0,
            linear_step: 1,
        };
        let seq: Vec<u64> = p.thresholds().take(5).collect();
        assert_eq!(seq, vec![1, 2, 3, 4, 5]);
        assert_eq!(p.next_threshold(u64::MAX), u64::MAX);
    }

    #[test]
    fn bad_policies_are_rejected() {
        let mut p = SamplerPolicy::default();
        p.factor = 1;
        assert!(p.validate().is_err());
        p.factor = 3;
        p.linear_step = 0;
        assert!(p.validate().is_err());
    }

    #[test]
    fn fires_at_policy_thresholds_and_tracks_peak() {
        let events = Arc::new(Mutex::new(Vec::new()));
        let policy = SamplerPolicy {
            factor: 2,
            linear_after: 4,
            linear_step: 3,
        };
        let mut s = ProgressSampler::new(
            policy,
            Box::new(Shared(Arc::clone(&events))),
            Box::new(Stepping(0)),
        );
        for v in 1..=12 {
            s.observe(v / 3, v);
        }
        let end = s.finish(4, 12);

        let events = events.lock().unwrap();
        let counts: Vec<u64> = events.iter().map(|e| e.values).collect();
        assert_eq!(counts, vec![1, 2, 4, 7, 10, 12]);
        assert_eq!(events.last().unwrap().stage, ProgressStage::TaskEnd);
        assert_eq!(end.peak_resident_bytes, 300);
        assert_eq!(s.fired(), 6);
    }

    #[test]
    fn event_display_matches_log_format() {
        let e = ProgressEvent {
            stage: ProgressStage::Progress,
            keys: 3,
            values: 8,
            memory: MemorySnapshot::default(),
        };
        assert!(e.to_string().starts_with("after processed 3 keys, 8 values"));
    }
}
