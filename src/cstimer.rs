//! Reader for csTimer's "export to file" format.
//!
//! The export is a JSON object. `properties.sessionN` holds the session
//! count, `properties.sessionData` holds a JSON *string* describing each
//! session, and the solves of session `i` live in the top-level array
//! `session<i>`. Each solve looks like
//! `[[penalty, time_ms], scramble, ..., completion_epoch_secs]`.

use chrono::{DateTime, Local};
use serde_json::{Map, Value};
use std::fs;
use std::path::Path;

use crate::error::{CubeError, Result};
use crate::solve::{Penalty, Session, SolveRecord};

/// csTimer penalty codes
pub const CODE_OK: i64 = 0;
pub const CODE_PLUS_TWO: i64 = 2000;
pub const CODE_DNF: i64 = -1;

/// Largest raw time accepted, so every time fits the store's integer column
pub const MAX_TIME_MS: u64 = i64::MAX as u64;

pub fn penalty_from_code(code: i64) -> Option<Penalty> {
    match code {
        CODE_OK => Some(Penalty::None),
        CODE_PLUS_TWO => Some(Penalty::PlusTwo),
        CODE_DNF => Some(Penalty::DidNotFinish),
        _ => None,
    }
}

pub fn read_cstimer<P: AsRef<Path>>(path: P) -> Result<Vec<Session>> {
    let text = fs::read_to_string(path)?;
    parse_cstimer(&text)
}

/// Parse and validate a whole export. Nothing is returned unless every
/// session and solve is well formed.
pub fn parse_cstimer(text: &str) -> Result<Vec<Session>> {
    let root: Value = serde_json::from_str(text)
        .map_err(|e| CubeError::import(format!("not a JSON document: {e}")))?;
    let root = root
        .as_object()
        .ok_or_else(|| CubeError::import("top level is not an object"))?;

    let properties = field(root, "properties", "")?
        .as_object()
        .ok_or_else(|| CubeError::import("`properties` is not an object"))?;

    let session_count = field(properties, "sessionN", "properties.")?
        .as_u64()
        .ok_or_else(|| CubeError::import("`properties.sessionN` is not a non-negative integer"))?;

    let session_data = parse_session_data(field(properties, "sessionData", "properties.")?)?;
    if session_count > session_data.len() as u64 {
        return Err(CubeError::import(format!(
            "`properties.sessionN` is {session_count} but `properties.sessionData` describes {} sessions",
            session_data.len()
        )));
    }

    let session_count = session_count as usize;
    let mut sessions = Vec::with_capacity(session_count);
    for idx in 1..=session_count {
        let meta = field(&session_data, &idx.to_string(), "properties.sessionData.")?;
        let key = format!("session{idx}");
        let solves = root
            .get(&key)
            .ok_or_else(|| CubeError::import(format!("missing key `{key}`")))?;
        sessions.push(parse_session(idx, meta, &key, solves)?);
    }

    tracing::info!(sessions = sessions.len(), "parsed csTimer export");
    Ok(sessions)
}

fn field<'a>(obj: &'a Map<String, Value>, key: &str, prefix: &str) -> Result<&'a Value> {
    obj.get(key)
        .ok_or_else(|| CubeError::import(format!("missing key `{prefix}{key}`")))
}

/// `sessionData` is normally a JSON-encoded string; accept a plain object too
fn parse_session_data(value: &Value) -> Result<Map<String, Value>> {
    let decoded = match value {
        Value::String(s) => serde_json::from_str::<Value>(s).map_err(|e| {
            CubeError::import(format!("`properties.sessionData` is not valid JSON: {e}"))
        })?,
        other => other.clone(),
    };
    match decoded {
        Value::Object(map) => Ok(map),
        _ => Err(CubeError::import("`properties.sessionData` is not an object")),
    }
}

fn session_name(meta: &Value, idx: usize) -> Result<String> {
    match meta.get("name") {
        Some(Value::String(s)) => Ok(s.clone()),
        Some(Value::Number(n)) => Ok(n.to_string()),
        Some(_) => Err(CubeError::import(format!(
            "`properties.sessionData.{idx}.name` is not a string"
        ))),
        None => Err(CubeError::import(format!(
            "missing key `properties.sessionData.{idx}.name`"
        ))),
    }
}

fn epoch_to_local(secs: i64, context: &str) -> Result<DateTime<Local>> {
    DateTime::from_timestamp(secs, 0)
        .map(|dt| dt.with_timezone(&Local))
        .ok_or_else(|| CubeError::import(format!("{context}: timestamp {secs} out of range")))
}

fn session_dates(meta: &Value, idx: usize) -> Result<(Option<DateTime<Local>>, Option<DateTime<Local>>)> {
    let Some(date) = meta.get("date") else {
        return Ok((None, None));
    };
    let context = format!("properties.sessionData.{idx}.date");
    let pair = date
        .as_array()
        .filter(|a| a.len() >= 2)
        .ok_or_else(|| CubeError::import(format!("`{context}` is not a [start, end] pair")))?;
    let convert = |v: &Value| -> Result<Option<DateTime<Local>>> {
        match v {
            Value::Null => Ok(None),
            other => other
                .as_i64()
                .ok_or_else(|| CubeError::import(format!("`{context}` holds a non-integer date")))
                .and_then(|secs| epoch_to_local(secs, &context).map(Some)),
        }
    };
    Ok((convert(&pair[0])?, convert(&pair[1])?))
}

fn parse_session(idx: usize, meta: &Value, key: &str, solves: &Value) -> Result<Session> {
    let mut session = Session::new(session_name(meta, idx)?);
    let (date_start, date_end) = session_dates(meta, idx)?;

    let entries = solves
        .as_array()
        .ok_or_else(|| CubeError::import(format!("`{key}` is not an array")))?;
    for (pos, entry) in entries.iter().enumerate() {
        let record = parse_solve(&session.name, pos + 1, entry, &format!("{key}[{pos}]"))?;
        session.solves.push(record);
    }

    session.date_start = date_start.or_else(|| session.solves.first().map(|s| s.timestamp));
    session.date_end = date_end.or_else(|| session.solves.last().map(|s| s.timestamp));
    Ok(session)
}

fn parse_solve(session: &str, sequence_number: usize, entry: &Value, context: &str) -> Result<SolveRecord> {
    let bad = |what: &str| CubeError::import(format!("`{context}` {what}"));

    let parts = entry
        .as_array()
        .filter(|a| a.len() >= 3)
        .ok_or_else(|| bad("is not a [[penalty, time], scramble, ..., timestamp] entry"))?;

    let result = parts[0]
        .as_array()
        .filter(|a| a.len() >= 2)
        .ok_or_else(|| bad("has no [penalty, time] pair"))?;
    let code = result[0].as_i64().ok_or_else(|| bad("has a non-integer penalty code"))?;
    let penalty = penalty_from_code(code).ok_or_else(|| bad(&format!("has unknown penalty code {code}")))?;
    let time_ms = result[1].as_u64().ok_or_else(|| bad("has a non-integer time"))?;
    if time_ms > MAX_TIME_MS {
        return Err(bad(&format!("has an out of range time {time_ms}")));
    }

    let scramble = parts[1].as_str().ok_or_else(|| bad("has a non-string scramble"))?;

    let completed = parts[parts.len() - 1]
        .as_i64()
        .ok_or_else(|| bad("has a non-integer completion timestamp"))?;
    let timestamp = epoch_to_local(completed, context)?;

    Ok(SolveRecord::new(session, sequence_number, Some(time_ms), penalty, timestamp).with_scramble(scramble))
}
