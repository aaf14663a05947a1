use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::fmt;

use crate::error::{CubeError, Result};
use crate::solve::{EffectiveTime, Session, SolveRecord};
use crate::util::{format_secs, mean, round3, trim_count};

/// Every window size the statistics engine knows how to track
pub const WINDOW_SIZES: [usize; 6] = [5, 12, 100, 1000, 5000, 10000];

/// Which rolling windows an engine tracks
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatsConfig {
    window_sizes: BTreeSet<usize>,
}

impl StatsConfig {
    /// Zero-sized windows are ignored.
    pub fn new(window_sizes: impl IntoIterator<Item = usize>) -> Self {
        Self {
            window_sizes: window_sizes.into_iter().filter(|n| *n > 0).collect(),
        }
    }

    /// ao5 and ao12, what the timer shows while solving
    pub fn live() -> Self {
        Self::new([5, 12])
    }

    /// All six windows, used when converting a full history
    pub fn full() -> Self {
        Self::new(WINDOW_SIZES)
    }

    pub fn window_sizes(&self) -> impl Iterator<Item = usize> + '_ {
        self.window_sizes.iter().copied()
    }

    pub fn tracks(&self, size: usize) -> bool {
        self.window_sizes.contains(&size)
    }
}

impl Default for StatsConfig {
    fn default() -> Self {
        Self::live()
    }
}

/// Value of a trimmed average.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Average {
    /// Not enough solves yet
    Pending,
    /// A DNF survived trimming
    Dnf,
    /// Seconds, rounded to milliseconds
    Secs(f64),
}

impl Average {
    pub fn secs(&self) -> Option<f64> {
        match self {
            Average::Secs(v) => Some(*v),
            _ => None,
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, Average::Pending)
    }

    /// Text for table cells: pending averages render as an empty cell
    pub fn cell(&self) -> String {
        match self {
            Average::Pending => String::new(),
            other => other.to_string(),
        }
    }
}

impl fmt::Display for Average {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Average::Pending => f.write_str("N/A"),
            Average::Dnf => f.write_str("DNF"),
            Average::Secs(v) => f.write_str(&format_secs(*v)),
        }
    }
}

/// Trimmed average of an ascending slice of effective times.
///
/// DNFs sit at the worst end of the slice; if any of them is still present
/// once the trim is removed the whole average is a DNF.
pub fn trimmed_average(sorted: &[EffectiveTime]) -> Average {
    if sorted.is_empty() {
        return Average::Pending;
    }
    let trim = trim_count(sorted.len());
    let keep_until = sorted.len() - trim;
    let finished: Vec<f64> = sorted.iter().map_while(EffectiveTime::as_secs).collect();
    if finished.len() < keep_until {
        return Average::Dnf;
    }
    match mean(&finished[trim..keep_until]) {
        Some(m) => Average::Secs(round3(m)),
        None => Average::Dnf,
    }
}

fn insert_sorted(sorted: &mut Vec<EffectiveTime>, time: EffectiveTime) {
    let idx = sorted.partition_point(|t| *t < time);
    sorted.insert(idx, time);
}

/// Fixed-capacity FIFO window of the most recent effective times
#[derive(Debug, Clone)]
pub struct RollingWindowState {
    size: usize,
    buffer: VecDeque<EffectiveTime>,
    // same contents as `buffer`, kept ascending
    sorted: Vec<EffectiveTime>,
    current: Average,
    best: Option<f64>,
}

impl RollingWindowState {
    pub fn new(size: usize) -> Self {
        Self {
            size,
            buffer: VecDeque::with_capacity(size),
            sorted: Vec::with_capacity(size),
            current: Average::Pending,
            best: None,
        }
    }

    /// Push a time, evicting the oldest once full. Returns true when the
    /// new average beat the previous best.
    pub fn push(&mut self, time: EffectiveTime) -> bool {
        if self.buffer.len() == self.size {
            if let Some(oldest) = self.buffer.pop_front() {
                if let Ok(idx) = self.sorted.binary_search(&oldest) {
                    self.sorted.remove(idx);
                }
            }
        }
        self.buffer.push_back(time);
        insert_sorted(&mut self.sorted, time);

        if self.buffer.len() < self.size {
            return false;
        }

        self.current = trimmed_average(&self.sorted);
        match (self.current, self.best) {
            (Average::Secs(avg), Some(best)) if avg < best => {
                self.best = Some(avg);
                true
            }
            (Average::Secs(avg), None) => {
                self.best = Some(avg);
                true
            }
            _ => false,
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Oldest first
    pub fn buffer(&self) -> &VecDeque<EffectiveTime> {
        &self.buffer
    }

    pub fn current(&self) -> Average {
        self.current
    }

    pub fn best(&self) -> Option<f64> {
        self.best
    }
}

/// Snapshot returned after each applied solve
#[derive(Debug, Clone, PartialEq)]
pub struct CurrentStats {
    pub num_solves: usize,
    pub last: EffectiveTime,
    pub current: BTreeMap<usize, Average>,
    /// Milliseconds; never a DNF
    pub best_single: Option<u64>,
    pub best_averages: BTreeMap<usize, Option<f64>>,
    pub new_best_single: bool,
    /// Windows whose best average improved with this solve
    pub new_best_averages: Vec<usize>,
}

impl CurrentStats {
    pub fn current(&self, size: usize) -> Average {
        self.current.get(&size).copied().unwrap_or(Average::Pending)
    }

    pub fn best_average(&self, size: usize) -> Option<f64> {
        self.best_averages.get(&size).copied().flatten()
    }
}

/// Statistics for a whole session
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSummary {
    pub num_solves: usize,
    /// Trimmed mean over every solve of the session
    pub average: Average,
    /// Milliseconds
    pub best_single: Option<u64>,
    pub best_averages: BTreeMap<usize, Option<f64>>,
}

impl SessionSummary {
    pub fn best_average(&self, size: usize) -> Option<f64> {
        self.best_averages.get(&size).copied().flatten()
    }

    pub fn best_single_secs(&self) -> Option<f64> {
        self.best_single.map(|ms| ms as f64 / 1000.0)
    }
}

/// Rolling and best statistics over an ordered stream of solves.
///
/// Feed solves with [`RollingStatsEngine::apply`] as they happen, or replay a
/// stored session with [`RollingStatsEngine::summarize`]. Both paths run the
/// same code, so a live engine and a replayed one agree at every prefix.
#[derive(Debug, Clone)]
pub struct RollingStatsEngine {
    config: StatsConfig,
    windows: BTreeMap<usize, RollingWindowState>,
    applied: usize,
    best_single: Option<u64>,
    // every applied time with its multiplicity
    all_times: BTreeMap<EffectiveTime, usize>,
}

impl RollingStatsEngine {
    pub fn new(config: StatsConfig) -> Self {
        let windows = config
            .window_sizes()
            .map(|size| (size, RollingWindowState::new(size)))
            .collect();
        Self {
            config,
            windows,
            applied: 0,
            best_single: None,
            all_times: BTreeMap::new(),
        }
    }

    /// Build an engine that has already seen `records`, in order
    pub fn replay<'a>(
        config: StatsConfig,
        records: impl IntoIterator<Item = &'a SolveRecord>,
    ) -> Result<Self> {
        let mut engine = Self::new(config);
        for record in records {
            engine.apply(record)?;
        }
        Ok(engine)
    }

    /// Batch statistics for `session` from a fresh engine
    pub fn summarize(config: StatsConfig, session: &Session) -> Result<SessionSummary> {
        Ok(Self::replay(config, &session.solves)?.summary())
    }

    pub fn apply(&mut self, record: &SolveRecord) -> Result<CurrentStats> {
        let expected = self.applied + 1;
        if record.sequence_number != expected {
            return Err(CubeError::OrderingViolation {
                expected,
                got: record.sequence_number,
            });
        }
        self.applied = expected;

        let time = record.effective_time();
        let mut new_best_averages = Vec::new();
        for (size, window) in self.windows.iter_mut() {
            if window.push(time) {
                new_best_averages.push(*size);
            }
        }

        let mut new_best_single = false;
        if let Some(ms) = time.as_millis() {
            if self.best_single.map_or(true, |best| ms < best) {
                self.best_single = Some(ms);
                new_best_single = true;
            }
        }
        *self.all_times.entry(time).or_default() += 1;

        Ok(CurrentStats {
            num_solves: self.applied,
            last: time,
            current: self.current_averages(),
            best_single: self.best_single,
            best_averages: self.best_averages(),
            new_best_single,
            new_best_averages,
        })
    }

    pub fn summary(&self) -> SessionSummary {
        SessionSummary {
            num_solves: self.applied,
            average: trimmed_average(&self.all_sorted()),
            best_single: self.best_single,
            best_averages: self.best_averages(),
        }
    }

    pub fn config(&self) -> &StatsConfig {
        &self.config
    }

    pub fn num_solves(&self) -> usize {
        self.applied
    }

    pub fn best_single(&self) -> Option<u64> {
        self.best_single
    }

    pub fn window(&self, size: usize) -> Option<&RollingWindowState> {
        self.windows.get(&size)
    }

    pub fn current_average(&self, size: usize) -> Average {
        self.windows
            .get(&size)
            .map_or(Average::Pending, RollingWindowState::current)
    }

    pub fn best_average(&self, size: usize) -> Option<f64> {
        self.windows.get(&size).and_then(RollingWindowState::best)
    }

    fn all_sorted(&self) -> Vec<EffectiveTime> {
        self.all_times
            .iter()
            .flat_map(|(time, count)| std::iter::repeat(*time).take(*count))
            .collect()
    }

    fn current_averages(&self) -> BTreeMap<usize, Average> {
        self.windows
            .iter()
            .map(|(size, w)| (*size, w.current()))
            .collect()
    }

    fn best_averages(&self) -> BTreeMap<usize, Option<f64>> {
        self.windows.iter().map(|(size, w)| (*size, w.best())).collect()
    }
}
