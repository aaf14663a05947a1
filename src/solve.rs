use chrono::{DateTime, Local};
use std::fmt;

use crate::util::format_secs;

/// Milliseconds added by a +2 penalty
pub const PLUS_TWO_MS: u64 = 2000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, strum_macros::Display)]
pub enum Penalty {
    #[default]
    #[strum(to_string = "OK")]
    None,
    #[strum(to_string = "+2")]
    PlusTwo,
    #[strum(to_string = "DNF")]
    DidNotFinish,
}

impl Penalty {
    /// Label used in the solves table and in exported rows. An unpenalized
    /// solve has an empty label.
    pub fn label(&self) -> &'static str {
        match self {
            Penalty::None => "",
            Penalty::PlusTwo => "+2",
            Penalty::DidNotFinish => "DNF",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim() {
            "" | "OK" => Some(Penalty::None),
            "+2" => Some(Penalty::PlusTwo),
            "DNF" => Some(Penalty::DidNotFinish),
            _ => None,
        }
    }
}

/// Time a solve counts for once its penalty is applied.
///
/// `Dnf` orders after every finished time, so sorting a slice of effective
/// times puts DNFs at the worst end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum EffectiveTime {
    Finished(u64),
    Dnf,
}

impl EffectiveTime {
    pub fn is_dnf(&self) -> bool {
        matches!(self, EffectiveTime::Dnf)
    }

    pub fn as_millis(&self) -> Option<u64> {
        match self {
            EffectiveTime::Finished(ms) => Some(*ms),
            EffectiveTime::Dnf => None,
        }
    }

    pub fn as_secs(&self) -> Option<f64> {
        self.as_millis().map(|ms| ms as f64 / 1000.0)
    }
}

impl fmt::Display for EffectiveTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.as_secs() {
            Some(secs) => f.write_str(&format_secs(secs)),
            None => f.write_str("DNF"),
        }
    }
}

/// A single solve as the statistics engine sees it
#[derive(Debug, Clone, PartialEq)]
pub struct SolveRecord {
    /// Row id in the solve store, stable across removals of other solves
    pub id: Option<i64>,
    /// 1-based position inside the session
    pub sequence_number: usize,
    /// Measured time without penalty; `None` for a void solve
    pub raw_time_ms: Option<u64>,
    pub penalty: Penalty,
    pub timestamp: DateTime<Local>,
    pub session_id: String,
    pub scramble: String,
}

impl SolveRecord {
    pub fn new(
        session_id: impl Into<String>,
        sequence_number: usize,
        raw_time_ms: Option<u64>,
        penalty: Penalty,
        timestamp: DateTime<Local>,
    ) -> Self {
        Self {
            id: None,
            sequence_number,
            raw_time_ms,
            penalty,
            timestamp,
            session_id: session_id.into(),
            scramble: String::new(),
        }
    }

    pub fn with_scramble(mut self, scramble: impl Into<String>) -> Self {
        self.scramble = scramble.into();
        self
    }

    pub fn with_id(mut self, id: i64) -> Self {
        self.id = Some(id);
        self
    }

    pub fn effective_time(&self) -> EffectiveTime {
        match (self.penalty, self.raw_time_ms) {
            (Penalty::DidNotFinish, _) | (_, None) => EffectiveTime::Dnf,
            (Penalty::PlusTwo, Some(ms)) => EffectiveTime::Finished(ms.saturating_add(PLUS_TWO_MS)),
            (Penalty::None, Some(ms)) => EffectiveTime::Finished(ms),
        }
    }
}

/// An ordered list of solves sharing a name
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Session {
    pub name: String,
    pub solves: Vec<SolveRecord>,
    pub date_start: Option<DateTime<Local>>,
    pub date_end: Option<DateTime<Local>>,
}

impl Session {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Append a solve, numbering it after the ones already held
    pub fn push(
        &mut self,
        raw_time_ms: Option<u64>,
        penalty: Penalty,
        timestamp: DateTime<Local>,
        scramble: impl Into<String>,
    ) -> &SolveRecord {
        let record = SolveRecord::new(
            self.name.clone(),
            self.solves.len() + 1,
            raw_time_ms,
            penalty,
            timestamp,
        )
        .with_scramble(scramble);
        self.solves.push(record);
        &self.solves[self.solves.len() - 1]
    }

    /// Reassign contiguous 1-based sequence numbers in list order
    pub fn renumber(&mut self) {
        for (idx, solve) in self.solves.iter_mut().enumerate() {
            solve.sequence_number = idx + 1;
        }
    }

    pub fn len(&self) -> usize {
        self.solves.len()
    }

    pub fn is_empty(&self) -> bool {
        self.solves.is_empty()
    }
}
