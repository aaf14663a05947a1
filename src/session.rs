use chrono::{DateTime, Local};

use crate::error::{CubeError, Result};
use crate::solve::{Penalty, Session, SolveRecord};
use crate::stats::{CurrentStats, RollingStatsEngine, SessionSummary, StatsConfig};
use crate::store::SolveStore;
use crate::util::format_millis;

/// Outcome of recording a solve in the live session
#[derive(Debug)]
pub struct SolveReport {
    pub stats: CurrentStats,
    /// Set when the solve could not be written to the store. The in-memory
    /// statistics already include it.
    pub persist_error: Option<CubeError>,
}

impl SolveReport {
    /// Status line announcing the most notable new best, if any
    pub fn announcement(&self) -> Option<String> {
        if let Some(size) = self.stats.new_best_averages.iter().max() {
            let best = self.stats.best_average(*size)?;
            return Some(format!("New best AO{size}: {best:.3} seconds"));
        }
        if self.stats.new_best_single {
            let best = self.stats.best_single?;
            return Some(format!("New fastest time: {} seconds", format_millis(best)));
        }
        None
    }
}

/// Parse a 1-based solve number typed by the user
pub fn parse_solve_number(text: &str) -> Result<usize> {
    let text = text.trim();
    if text.is_empty() || !text.chars().all(|c| c.is_ascii_digit()) {
        return Err(CubeError::InvalidSolveNumber(text.to_string()));
    }
    text.parse::<usize>()
        .map_err(|_| CubeError::InvalidSolveNumber(text.to_string()))
}

/// The session the timer is currently recording into.
///
/// Owns the statistics engine for that session. Switching session, or
/// editing an earlier solve, throws the engine away and replays the
/// persisted solves into a fresh one.
#[derive(Debug)]
pub struct LiveSession {
    store: SolveStore,
    config: StatsConfig,
    sessions: Vec<String>,
    current: Session,
    engine: RollingStatsEngine,
    last_stats: Option<CurrentStats>,
}

impl LiveSession {
    /// Open the store's sessions and select `preferred` when it exists
    pub fn open(store: SolveStore, config: StatsConfig, preferred: Option<&str>) -> Result<Self> {
        let sessions = store.load_sessions()?;
        let name = preferred
            .filter(|p| sessions.iter().any(|s| s == p))
            .map(str::to_string)
            .unwrap_or_else(|| sessions[0].clone());

        let mut live = Self {
            store,
            engine: RollingStatsEngine::new(config.clone()),
            config,
            sessions,
            current: Session::new(name.clone()),
            last_stats: None,
        };
        live.switch_session(&name)?;
        Ok(live)
    }

    pub fn switch_session(&mut self, name: &str) -> Result<()> {
        let solves = self.store.fetch_solves(name)?;
        self.current = Session::new(name);
        self.current.solves = solves;
        self.rebuild_engine(None)?;
        tracing::info!(
            session = name,
            solves = self.current.len(),
            "switched session"
        );
        Ok(())
    }

    /// Switch to the session after (or before) the current one, wrapping
    pub fn cycle_session(&mut self, forward: bool) -> Result<()> {
        let count = self.sessions.len();
        let idx = self
            .sessions
            .iter()
            .position(|s| *s == self.current.name)
            .unwrap_or(0);
        let next = if forward {
            (idx + 1) % count
        } else {
            (idx + count - 1) % count
        };
        let name = self.sessions[next].clone();
        self.switch_session(&name)
    }

    /// Replay the current solves into a fresh engine. Stored average columns
    /// are rewritten for every solve from index `rewrite_from` on.
    fn rebuild_engine(&mut self, rewrite_from: Option<usize>) -> Result<()> {
        self.current.renumber();
        let mut engine = RollingStatsEngine::new(self.config.clone());
        let mut last = None;
        for (idx, record) in self.current.solves.iter().enumerate() {
            let stats = engine.apply(record)?;
            if let (Some(from), Some(id)) = (rewrite_from, record.id) {
                if idx >= from {
                    self.store.update_averages(id, &stats)?;
                }
            }
            last = Some(stats);
        }
        self.engine = engine;
        self.last_stats = last;
        Ok(())
    }

    /// Re-read the current session after an edit at index `edited`
    fn reload_from(&mut self, edited: usize) -> Result<()> {
        self.current.solves = self.store.fetch_solves(&self.current.name)?;
        self.rebuild_engine(Some(edited))
    }

    pub fn record_solve(&mut self, raw_time_ms: u64, scramble: &str) -> Result<SolveReport> {
        self.record_solve_at(raw_time_ms, scramble, Local::now())
    }

    pub fn record_solve_at(
        &mut self,
        raw_time_ms: u64,
        scramble: &str,
        timestamp: DateTime<Local>,
    ) -> Result<SolveReport> {
        let mut record = SolveRecord::new(
            self.current.name.clone(),
            self.current.len() + 1,
            Some(raw_time_ms),
            Penalty::None,
            timestamp,
        )
        .with_scramble(scramble);

        let stats = self.engine.apply(&record)?;

        let persist_error = match self.persist(&record, &stats) {
            Ok(id) => {
                record.id = Some(id);
                None
            }
            Err(err) => {
                tracing::warn!(session = %self.current.name, "solve not saved: {err}");
                Some(err)
            }
        };

        self.current.solves.push(record);
        self.last_stats = Some(stats.clone());
        Ok(SolveReport {
            stats,
            persist_error,
        })
    }

    fn persist(&self, record: &SolveRecord, stats: &CurrentStats) -> Result<i64> {
        let id = self.store.insert_solve(record)?;
        self.store.update_averages(id, stats)?;
        Ok(id)
    }

    fn solve_index(&self, number: usize) -> Result<usize> {
        if number == 0 || number > self.current.len() {
            return Err(CubeError::InvalidSolveNumber(format!(
                "{number} (out of range)"
            )));
        }
        Ok(number - 1)
    }

    /// Change the penalty of solve `number` (1-based). A +2 on a DNF is
    /// ignored.
    pub fn apply_penalty(&mut self, number: usize, penalty: Penalty) -> Result<()> {
        let idx = self.solve_index(number)?;
        let solve = &self.current.solves[idx];
        if penalty == Penalty::PlusTwo && solve.penalty == Penalty::DidNotFinish {
            return Ok(());
        }

        match solve.id {
            Some(id) => {
                self.store.set_penalty(id, penalty)?;
                self.reload_from(idx)
            }
            None => {
                self.current.solves[idx].penalty = penalty;
                self.rebuild_engine(None)
            }
        }
    }

    pub fn remove_solve(&mut self, number: usize) -> Result<()> {
        let idx = self.solve_index(number)?;
        match self.current.solves[idx].id {
            Some(id) => {
                self.store.remove_solve(id)?;
                self.reload_from(idx)
            }
            None => {
                self.current.solves.remove(idx);
                self.rebuild_engine(None)
            }
        }
    }

    pub fn apply_penalty_last(&mut self, penalty: Penalty) -> Result<()> {
        self.apply_penalty(self.current.len(), penalty)
    }

    pub fn remove_last(&mut self) -> Result<()> {
        self.remove_solve(self.current.len())
    }

    pub fn create_session(&mut self, name: &str) -> Result<()> {
        let name = name.trim();
        if name.is_empty() {
            return Ok(());
        }
        if !self.store.create_session(name)? {
            return Err(CubeError::DuplicateSession(name.to_string()));
        }
        self.sessions.push(name.to_string());
        self.switch_session(name)
    }

    /// Delete the current session with its solves and select the first
    /// remaining one
    pub fn delete_current_session(&mut self) -> Result<()> {
        let name = self.current.name.clone();
        self.sessions = self.store.delete_session(&name)?;
        tracing::info!(session = %name, "deleted session");
        let first = self.sessions[0].clone();
        self.switch_session(&first)
    }

    pub fn name(&self) -> &str {
        &self.current.name
    }

    pub fn sessions(&self) -> &[String] {
        &self.sessions
    }

    pub fn solves(&self) -> &[SolveRecord] {
        &self.current.solves
    }

    pub fn session(&self) -> &Session {
        &self.current
    }

    pub fn engine(&self) -> &RollingStatsEngine {
        &self.engine
    }

    pub fn last_stats(&self) -> Option<&CurrentStats> {
        self.last_stats.as_ref()
    }

    pub fn summary(&self) -> SessionSummary {
        self.engine.summary()
    }

    /// `Session "x": n solves, Fastest: t s`
    pub fn status_line(&self) -> String {
        let fastest = self
            .engine
            .best_single()
            .map_or_else(|| "N/A".to_string(), format_millis);
        format!(
            "Session \"{}\": {} solves, Fastest: {} s",
            self.current.name,
            self.current.len(),
            fastest
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::Average;
    use assert_matches::assert_matches;

    fn fresh() -> LiveSession {
        LiveSession::open(SolveStore::open_in_memory().unwrap(), StatsConfig::live(), None).unwrap()
    }

    fn record_all(live: &mut LiveSession, times: &[u64]) {
        for t in times {
            live.record_solve(*t, "R U").unwrap();
        }
    }

    #[test]
    fn opens_first_default_session() {
        let live = fresh();
        assert_eq!(live.name(), "1");
        assert_eq!(live.sessions().len(), 5);
        assert_eq!(live.status_line(), "Session \"1\": 0 solves, Fastest: N/A s");
    }

    #[test]
    fn preferred_session_is_selected() {
        let live =
            LiveSession::open(SolveStore::open_in_memory().unwrap(), StatsConfig::live(), Some("3")).unwrap();
        assert_eq!(live.name(), "3");
    }

    #[test]
    fn unknown_preferred_session_falls_back() {
        let live =
            LiveSession::open(SolveStore::open_in_memory().unwrap(), StatsConfig::live(), Some("nope")).unwrap();
        assert_eq!(live.name(), "1");
    }

    #[test]
    fn record_solve_persists_and_updates_stats() {
        let mut live = fresh();
        record_all(&mut live, &[10_000, 12_000, 11_000, 30_000]);
        let report = live.record_solve(8_000, "F2").unwrap();
        assert!(report.persist_error.is_none());
        assert_eq!(report.stats.current(5), Average::Secs(11.0));
        assert_eq!(report.announcement().unwrap(), "New best AO5: 11.000 seconds");
        assert!(live.solves().iter().all(|s| s.id.is_some()));
        assert_eq!(live.status_line(), "Session \"1\": 5 solves, Fastest: 8.000 s");
    }

    #[test]
    fn fastest_time_announcement() {
        let mut live = fresh();
        let report = live.record_solve(9_876, "R").unwrap();
        assert_eq!(report.announcement().unwrap(), "New fastest time: 9.876 seconds");
        let report = live.record_solve(19_876, "R").unwrap();
        assert_eq!(report.announcement(), None);
    }

    #[test]
    fn switching_sessions_replays_store() {
        let mut live = fresh();
        record_all(&mut live, &[10_000, 11_000]);
        live.switch_session("2").unwrap();
        assert!(live.solves().is_empty());
        assert_eq!(live.engine().num_solves(), 0);

        live.switch_session("1").unwrap();
        assert_eq!(live.solves().len(), 2);
        assert_eq!(live.engine().best_single(), Some(10_000));
    }

    #[test]
    fn cycle_session_wraps() {
        let mut live = fresh();
        live.cycle_session(false).unwrap();
        assert_eq!(live.name(), "5");
        live.cycle_session(true).unwrap();
        assert_eq!(live.name(), "1");
    }

    #[test]
    fn penalty_and_removal_rebuild_statistics() {
        let mut live = fresh();
        record_all(&mut live, &[10_000, 12_000, 9_000]);

        live.apply_penalty(3, Penalty::DidNotFinish).unwrap();
        assert_eq!(live.engine().best_single(), Some(10_000));
        assert_eq!(live.solves()[2].penalty, Penalty::DidNotFinish);

        // +2 cannot turn a DNF back into a time
        live.apply_penalty(3, Penalty::PlusTwo).unwrap();
        assert_eq!(live.solves()[2].penalty, Penalty::DidNotFinish);

        live.apply_penalty(3, Penalty::None).unwrap();
        assert_eq!(live.engine().best_single(), Some(9_000));

        live.remove_solve(1).unwrap();
        assert_eq!(live.solves().len(), 2);
        assert_eq!(live.solves()[0].sequence_number, 1);
        assert_eq!(live.solves()[0].raw_time_ms, Some(12_000));
    }

    #[test]
    fn last_solve_helpers() {
        let mut live = fresh();
        record_all(&mut live, &[10_000, 12_000]);
        live.apply_penalty_last(Penalty::PlusTwo).unwrap();
        assert_eq!(live.solves()[1].penalty, Penalty::PlusTwo);
        live.remove_last().unwrap();
        assert_eq!(live.solves().len(), 1);
    }

    #[test]
    fn invalid_solve_numbers_do_not_mutate() {
        let mut live = fresh();
        record_all(&mut live, &[10_000]);
        assert_matches!(
            live.apply_penalty(2, Penalty::PlusTwo),
            Err(CubeError::InvalidSolveNumber(_))
        );
        assert_matches!(live.remove_solve(0), Err(CubeError::InvalidSolveNumber(_)));
        assert_eq!(live.solves()[0].penalty, Penalty::None);

        let mut empty = fresh();
        assert_matches!(empty.remove_last(), Err(CubeError::InvalidSolveNumber(_)));
    }

    #[test]
    fn parse_solve_numbers() {
        assert_eq!(parse_solve_number(" 12 ").unwrap(), 12);
        assert_matches!(parse_solve_number("-1"), Err(CubeError::InvalidSolveNumber(_)));
        assert_matches!(parse_solve_number("abc"), Err(CubeError::InvalidSolveNumber(_)));
        assert_matches!(parse_solve_number(""), Err(CubeError::InvalidSolveNumber(_)));
    }

    #[test]
    fn create_and_delete_sessions() {
        let mut live = fresh();
        live.create_session("OH").unwrap();
        assert_eq!(live.name(), "OH");
        assert_matches!(live.create_session("OH"), Err(CubeError::DuplicateSession(_)));

        record_all(&mut live, &[20_000]);
        live.delete_current_session().unwrap();
        assert_eq!(live.name(), "1");
        assert!(!live.sessions().contains(&"OH".to_string()));
    }

    #[test]
    fn deleting_every_session_recreates_default() {
        let mut live = fresh();
        for _ in 0..5 {
            live.delete_current_session().unwrap();
        }
        assert_eq!(live.sessions(), ["Default".to_string()]);
        assert_eq!(live.name(), "Default");
    }

    fn assert_stored_averages_match(live: &LiveSession) {
        let mut engine = RollingStatsEngine::new(StatsConfig::live());
        for record in live.solves() {
            let stats = engine.apply(record).unwrap();
            for size in [5, 12] {
                assert_eq!(
                    live.store.stored_average(record.id.unwrap(), size).unwrap(),
                    stats.current(size),
                    "ao{size} of solve {}",
                    record.sequence_number
                );
            }
        }
    }

    #[test]
    fn edits_rewrite_stored_averages() {
        let mut live = fresh();
        record_all(&mut live, &[10_000, 11_000, 12_000, 13_000, 14_000, 15_000]);

        live.apply_penalty(1, Penalty::DidNotFinish).unwrap();
        live.apply_penalty(2, Penalty::DidNotFinish).unwrap();
        assert_eq!(live.engine().current_average(5), Average::Secs(14.0));
        assert_stored_averages_match(&live);

        live.apply_penalty(3, Penalty::DidNotFinish).unwrap();
        assert_eq!(live.engine().current_average(5), Average::Dnf);
        let last = live.solves()[5].id.unwrap();
        assert_eq!(live.store.stored_average(last, 5).unwrap(), Average::Dnf);

        live.remove_solve(1).unwrap();
        assert_eq!(live.solves().len(), 5);
        assert_stored_averages_match(&live);
    }

    #[test]
    fn stored_averages_survive_reopen_after_edit() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("solves.db");
        {
            let store = SolveStore::open(&db).unwrap();
            let mut live = LiveSession::open(store, StatsConfig::live(), None).unwrap();
            record_all(&mut live, &[10_000, 11_000, 12_000, 13_000, 14_000]);
            live.apply_penalty(1, Penalty::DidNotFinish).unwrap();
            live.apply_penalty(2, Penalty::DidNotFinish).unwrap();
        }
        let live = LiveSession::open(SolveStore::open(&db).unwrap(), StatsConfig::live(), None).unwrap();
        assert_eq!(live.engine().current_average(5), Average::Dnf);
        assert_stored_averages_match(&live);
    }

    #[test]
    fn live_summary_matches_batch() {
        let mut live = fresh();
        record_all(&mut live, &[10_000, 12_000, 11_000, 30_000, 8_000, 9_000]);
        live.apply_penalty(2, Penalty::PlusTwo).unwrap();
        let batch = RollingStatsEngine::summarize(StatsConfig::live(), live.session()).unwrap();
        assert_eq!(live.summary(), batch);
    }
}
