use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use crate::cstimer::read_cstimer;
use crate::error::Result;
use crate::export::{write_rows, DateStyle, SessionRow, SolveRow};
use crate::solve::Session;
use crate::stats::{RollingStatsEngine, StatsConfig};

/// File name used for the session table when none is given
pub const DEFAULT_SESSIONS_FILE: &str = "sessions.csv";

/// Both output tables, fully computed before anything is written
#[derive(Debug, Default, PartialEq)]
pub struct Conversion {
    pub solves: Vec<SolveRow>,
    pub sessions: Vec<SessionRow>,
}

/// `sessions.csv` in the directory of `output`
pub fn default_sessions_path(output: &Path) -> PathBuf {
    match output.parent() {
        Some(dir) => dir.join(DEFAULT_SESSIONS_FILE),
        None => PathBuf::from(DEFAULT_SESSIONS_FILE),
    }
}

/// Replay every session through a fresh engine tracking all windows
pub fn convert_sessions(sessions: &[Session], dates: DateStyle) -> Result<Conversion> {
    let mut out = Conversion::default();
    for session in sessions {
        let mut engine = RollingStatsEngine::new(StatsConfig::full());
        for record in &session.solves {
            let stats = engine.apply(record)?;
            out.solves.push(SolveRow::new(record, &stats, dates));
        }
        out.sessions.push(SessionRow::new(
            &session.name,
            session.date_start.as_ref(),
            session.date_end.as_ref(),
            &engine.summary(),
            dates,
        ));
        tracing::debug!(session = %session.name, solves = session.len(), "converted session");
    }
    Ok(out)
}

/// Convert a csTimer export into the solves and sessions tables. The input
/// is read and validated completely before either file is created, and both
/// files are created before either is written.
pub fn convert_file(input: &Path, solves_out: &Path, sessions_out: &Path, dates: DateStyle) -> Result<Conversion> {
    let sessions = read_cstimer(input)?;
    let conversion = convert_sessions(&sessions, dates)?;

    let solves_file = File::create(solves_out)?;
    let sessions_file = match File::create(sessions_out) {
        Ok(file) => file,
        Err(err) => {
            drop(solves_file);
            if let Err(cleanup) = fs::remove_file(solves_out) {
                tracing::warn!("could not remove {}: {cleanup}", solves_out.display());
            }
            return Err(err.into());
        }
    };

    write_rows(BufWriter::new(solves_file), &conversion.solves)?;
    write_rows(BufWriter::new(sessions_file), &conversion.sessions)?;

    tracing::info!(
        sessions = conversion.sessions.len(),
        solves = conversion.solves.len(),
        "wrote {} and {}",
        solves_out.display(),
        sessions_out.display()
    );
    Ok(conversion)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CubeError;
    use crate::solve::Penalty;
    use assert_matches::assert_matches;
    use chrono::Local;
    use std::fs;
    use tempfile::tempdir;

    const EXPORT: &str = r#"{"properties":{"sessionN":2,"sessionData":"{\"1\":{\"name\":\"main\",\"date\":[1700000000,1700000600]},\"2\":{\"name\":\"oh\"}}"},"session1":[[[0,10000],"R",1700000000],[[0,12000],"U",1700000100],[[2000,11000],"F",1700000200],[[0,13000],"D",1700000300],[[-1,9000],"B",1700000400],[[0,14000],"L",1700000600]],"session2":[[[0,30000],"R2",1700001000]]}"#;

    #[test]
    fn default_sessions_path_sits_next_to_output() {
        assert_eq!(
            default_sessions_path(Path::new("/tmp/out/solves.csv")),
            PathBuf::from("/tmp/out/sessions.csv")
        );
        assert_eq!(
            default_sessions_path(Path::new("solves.csv")),
            PathBuf::from("sessions.csv")
        );
    }

    #[test]
    fn sessions_restart_numbering_and_statistics() {
        let mut a = Session::new("a");
        let mut b = Session::new("b");
        for ms in [5_000, 6_000, 7_000, 8_000, 9_000] {
            a.push(Some(ms), Penalty::None, Local::now(), "R");
        }
        b.push(Some(4_000), Penalty::None, Local::now(), "U");

        let conv = convert_sessions(&[a, b], DateStyle::Utc).unwrap();
        assert_eq!(conv.solves.len(), 6);
        assert_eq!(conv.solves[4].avg5, "7.000");
        assert_eq!(conv.solves[5].num, 1);
        assert_eq!(conv.solves[5].session, "b");
        assert_eq!(conv.solves[5].avg5, "");

        assert_eq!(conv.sessions[0].best_time, "5.000");
        assert_eq!(conv.sessions[0].best_avg5, "7.000");
        assert_eq!(conv.sessions[1].best_avg5, "");
        assert_eq!(conv.sessions[1].average, "4.000");
    }

    #[test]
    fn convert_file_writes_both_tables() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("export.txt");
        fs::write(&input, EXPORT).unwrap();
        let solves = dir.path().join("solves.csv");
        let sessions = default_sessions_path(&solves);

        let conv = convert_file(&input, &solves, &sessions, DateStyle::Utc).unwrap();
        assert_eq!(conv.solves.len(), 7);

        let text = fs::read_to_string(&solves).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 8);
        // 10, 12, 13(+2), 13, DNF: drop 10 and DNF
        assert!(lines[5].starts_with("main,5,2023-11-14 22:20:00,9.000,DNF,B,12.667,"));

        let summary = fs::read_to_string(&sessions).unwrap();
        assert!(summary.contains("main,6,2023-11-14 22:13:20,2023-11-14 22:23:20,"));
        assert!(summary.contains("oh,1,2023-11-14 22:30:00,2023-11-14 22:30:00,30.000,30.000,"));
    }

    #[test]
    fn malformed_input_writes_nothing() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("export.txt");
        fs::write(&input, EXPORT.replace("[[0,12000]", "[[7,12000]")).unwrap();
        let solves = dir.path().join("solves.csv");
        let sessions = dir.path().join("sessions.csv");

        let err = convert_file(&input, &solves, &sessions, DateStyle::Local).unwrap_err();
        assert_matches!(err, CubeError::ImportFormat(_));
        assert!(!solves.exists());
        assert!(!sessions.exists());
    }

    #[test]
    fn unwritable_sessions_path_leaves_no_solves_file() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("export.txt");
        fs::write(&input, EXPORT).unwrap();
        let solves = dir.path().join("solves.csv");
        let sessions = dir.path().join("missing").join("sessions.csv");

        let err = convert_file(&input, &solves, &sessions, DateStyle::Utc).unwrap_err();
        assert_matches!(err, CubeError::Io { .. });
        assert!(!solves.exists());
    }

    #[test]
    fn missing_input_is_an_io_error() {
        let dir = tempdir().unwrap();
        let err = convert_file(
            &dir.path().join("nope.txt"),
            &dir.path().join("s.csv"),
            &dir.path().join("x.csv"),
            DateStyle::Local,
        )
        .unwrap_err();
        assert_matches!(err, CubeError::Io { .. });
    }
}
