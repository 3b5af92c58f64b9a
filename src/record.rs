use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::step_timer::CfopStep;

/// Penalty for starting the solve after the inspection limit
pub const INSPECTION_PENALTY: Duration = Duration::from_millis(2000);

/// Truncate to whole milliseconds, the resolution records are kept at
pub fn to_millis(d: Duration) -> Duration {
    Duration::from_millis(d.as_millis() as u64)
}

/// A record in a history collection that competes for personal best
pub trait Timed {
    fn id(&self) -> u64;
    fn set_id(&mut self, id: u64);
    /// The value ranked for personal best and averages
    fn time(&self) -> Duration;
    fn is_personal_best(&self) -> bool;
    fn set_personal_best(&mut self, pb: bool);
}

/// One finished solve. `elapsed` already includes `penalty`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SolveRecord {
    #[serde(default)]
    pub id: u64,
    #[serde(with = "duration_ms")]
    pub elapsed: Duration,
    #[serde(with = "duration_ms", default)]
    pub penalty: Duration,
    #[serde(default)]
    pub scramble: Option<String>,
    #[serde(with = "timestamp", default = "Local::now")]
    pub recorded_at: DateTime<Local>,
    #[serde(default)]
    pub is_personal_best: bool,
}

impl SolveRecord {
    pub fn new(raw: Duration, penalty: Duration, scramble: Option<String>) -> Self {
        Self {
            id: 0,
            elapsed: to_millis(raw + penalty),
            penalty: to_millis(penalty),
            scramble,
            recorded_at: Local::now(),
            is_personal_best: false,
        }
    }

    pub fn has_penalty(&self) -> bool {
        !self.penalty.is_zero()
    }
}

impl Timed for SolveRecord {
    fn id(&self) -> u64 {
        self.id
    }

    fn set_id(&mut self, id: u64) {
        self.id = id;
    }

    fn time(&self) -> Duration {
        self.elapsed
    }

    fn is_personal_best(&self) -> bool {
        self.is_personal_best
    }

    fn set_personal_best(&mut self, pb: bool) {
        self.is_personal_best = pb;
    }
}

/// Time spent on one CFOP phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepSplit {
    pub step: CfopStep,
    #[serde(with = "duration_ms")]
    pub elapsed: Duration,
}

impl StepSplit {
    pub fn new(step: CfopStep, elapsed: Duration) -> Self {
        Self {
            step,
            elapsed: to_millis(elapsed),
        }
    }
}

/// A full Cross/F2L/OLL/PLL solve. The total is always derived from the splits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepSolveRecord {
    #[serde(default)]
    pub id: u64,
    pub steps: [StepSplit; 4],
    #[serde(with = "timestamp", default = "Local::now")]
    pub recorded_at: DateTime<Local>,
    #[serde(default)]
    pub is_personal_best: bool,
}

impl StepSolveRecord {
    pub fn new(steps: [StepSplit; 4]) -> Self {
        Self {
            id: 0,
            steps,
            recorded_at: Local::now(),
            is_personal_best: false,
        }
    }

    pub fn total(&self) -> Duration {
        self.steps.iter().map(|s| s.elapsed).sum()
    }

    pub fn split(&self, step: CfopStep) -> Option<Duration> {
        self.steps
            .iter()
            .find(|s| s.step == step)
            .map(|s| s.elapsed)
    }
}

impl Timed for StepSolveRecord {
    fn id(&self) -> u64 {
        self.id
    }

    fn set_id(&mut self, id: u64) {
        self.id = id;
    }

    fn time(&self) -> Duration {
        self.total()
    }

    fn is_personal_best(&self) -> bool {
        self.is_personal_best
    }

    fn set_personal_best(&mut self, pb: bool) {
        self.is_personal_best = pb;
    }
}

/// One stopped drill timer for a single step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepDrillRecord {
    pub step: CfopStep,
    #[serde(with = "duration_ms")]
    pub elapsed: Duration,
    #[serde(with = "timestamp", default = "Local::now")]
    pub recorded_at: DateTime<Local>,
}

impl StepDrillRecord {
    pub fn new(step: CfopStep, elapsed: Duration) -> Self {
        Self {
            step,
            elapsed: to_millis(elapsed),
            recorded_at: Local::now(),
        }
    }
}

/// Durations stored as (possibly fractional) milliseconds
pub mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let ms = f64::deserialize(d)?;
        if !ms.is_finite() || ms <= 0.0 {
            return Ok(Duration::ZERO);
        }
        Ok(Duration::from_millis(ms.round() as u64))
    }
}

/// RFC 3339 timestamps; anything unparseable becomes "now" so the record survives
pub mod timestamp {
    use chrono::{DateTime, Local, TimeZone};
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use serde_json::Value;
    use tracing::warn;

    pub fn serialize<S: Serializer>(t: &DateTime<Local>, s: S) -> Result<S::Ok, S::Error> {
        t.to_rfc3339().serialize(s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<DateTime<Local>, D::Error> {
        let raw = Value::deserialize(d)?;
        Ok(parse(&raw).unwrap_or_else(|| {
            warn!(value = %raw, "unreadable timestamp, using now");
            Local::now()
        }))
    }

    fn parse(raw: &Value) -> Option<DateTime<Local>> {
        match raw {
            Value::String(s) => DateTime::parse_from_rfc3339(s)
                .ok()
                .map(|t| t.with_timezone(&Local)),
            Value::Number(n) => n
                .as_i64()
                .and_then(|ms| Local.timestamp_millis_opt(ms).single()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Datelike;
    use serde_json::json;

    fn splits(ms: [u64; 4]) -> [StepSplit; 4] {
        let mut out = [StepSplit::new(CfopStep::Cross, Duration::ZERO); 4];
        for (i, step) in CfopStep::ALL.iter().enumerate() {
            out[i] = StepSplit::new(*step, Duration::from_millis(ms[i]));
        }
        out
    }

    #[test]
    fn solve_record_includes_penalty() {
        let record = SolveRecord::new(Duration::from_millis(9_876), INSPECTION_PENALTY, None);
        assert_eq!(record.elapsed, Duration::from_millis(11_876));
        assert!(record.has_penalty());
    }

    #[test]
    fn solve_record_truncates_to_millis() {
        let record = SolveRecord::new(Duration::from_micros(1_234_567), Duration::ZERO, None);
        assert_eq!(record.elapsed, Duration::from_millis(1_234));
    }

    #[test]
    fn step_total_is_sum_of_splits() {
        let record = StepSolveRecord::new(splits([1200, 3400, 800, 600]));
        assert_eq!(record.total(), Duration::from_millis(6000));
        assert_eq!(record.split(CfopStep::Oll), Some(Duration::from_millis(800)));
    }

    #[test]
    fn timestamp_roundtrips_as_rfc3339() {
        let record = SolveRecord::new(Duration::from_millis(1000), Duration::ZERO, None);
        let value = serde_json::to_value(&record).unwrap();
        assert!(value["recordedAt"].is_string());

        let back: SolveRecord = serde_json::from_value(value).unwrap();
        assert_eq!(back.recorded_at.timestamp(), record.recorded_at.timestamp());
    }

    #[test]
    fn bad_timestamp_keeps_record() {
        let value = json!({
            "id": 3,
            "elapsed": 12345.6,
            "recordedAt": "yesterday-ish",
            "isPersonalBest": true
        });
        let record: SolveRecord = serde_json::from_value(value).unwrap();
        assert_eq!(record.id, 3);
        assert_eq!(record.elapsed, Duration::from_millis(12346));
        assert_eq!(record.recorded_at.year(), Local::now().year());
    }

    #[test]
    fn negative_elapsed_clamps_to_zero() {
        let value = json!({"id": 1, "elapsed": -5, "recordedAt": "2024-01-01T10:00:00Z"});
        let record: SolveRecord = serde_json::from_value(value).unwrap();
        assert_eq!(record.elapsed, Duration::ZERO);
        assert_eq!(record.recorded_at.with_timezone(&chrono::Utc).year(), 2024);
    }

    #[test]
    fn step_record_requires_four_splits() {
        let value = json!({
            "id": 1,
            "steps": [{"step": "Cross", "elapsed": 1000}],
            "recordedAt": "2024-01-01T10:00:00Z"
        });
        assert!(serde_json::from_value::<StepSolveRecord>(value).is_err());
    }
}
