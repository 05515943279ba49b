//! Optional execution guards.
//!
//! Programs may loop forever, and by default they are allowed to. Callers that
//! need a bound (tests, the CLI's `--max-steps`) configure an instruction budget
//! or a wall-clock budget here; a zero value disables the corresponding check.

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use thiserror::Error;

mod duration_format {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

/// Call-site configurable limits. Zero means unlimited.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SandboxLimits {
    pub instruction_limit: u64,
    #[serde(with = "duration_format")]
    pub wall_time: Duration,
}

impl SandboxLimits {
    pub fn unlimited() -> Self {
        Self::default()
    }

    pub fn with_instruction_limit(mut self, limit: u64) -> Self {
        self.instruction_limit = limit;
        self
    }

    pub fn with_wall_time(mut self, wall_time: Duration) -> Self {
        self.wall_time = wall_time;
        self
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SandboxMetrics {
    pub instruction_count: u64,
    #[serde(with = "duration_format")]
    pub elapsed: Duration,
}

/// Stateful sandbox tracker used by the interpreter.
#[derive(Debug)]
pub struct Sandbox {
    limits: SandboxLimits,
    start: Instant,
    metrics: SandboxMetrics,
}

impl Sandbox {
    pub fn new(limits: SandboxLimits) -> Self {
        Self {
            limits,
            start: Instant::now(),
            metrics: SandboxMetrics::default(),
        }
    }

    pub fn metrics(&self) -> SandboxMetrics {
        let mut metrics = self.metrics;
        metrics.elapsed = self.start.elapsed();
        metrics
    }

    /// Call before executing each instruction.
    pub fn observe_instruction(&mut self) -> Result<(), SandboxError> {
        let limit = self.limits.instruction_limit;
        if limit != 0 && self.metrics.instruction_count >= limit {
            return Err(SandboxError::InstructionLimit { limit });
        }
        self.metrics.instruction_count += 1;
        self.enforce_wall_time()
    }

    fn enforce_wall_time(&self) -> Result<(), SandboxError> {
        if self.limits.wall_time.is_zero() {
            return Ok(());
        }
        if self.start.elapsed() > self.limits.wall_time {
            return Err(SandboxError::Timeout {
                limit: self.limits.wall_time,
            });
        }
        Ok(())
    }
}

/// Sandbox enforcement errors raised to the caller.
#[derive(Debug, Clone, Error)]
pub enum SandboxError {
    #[error("instruction limit exceeded (limit {limit})")]
    InstructionLimit { limit: u64 },
    #[error("execution timed out after {limit:?}")]
    Timeout { limit: Duration },
}
