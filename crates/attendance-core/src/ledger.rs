//! Flat-file attendance ledger.
//!
//! The store is a plain CSV-like text file:
//!
//! ```text
//! Name,Date,Time
//! ALICE,2024-06-01,09:30:00
//! BOB,2024-06-01,09:31:12
//! ```
//!
//! Fields are never quoted, which is why [`AttendeeName`] rejects commas and
//! line breaks. Records are written as a line break followed by the record, so
//! the file carries no trailing newline, the same layout as existing ledgers.

use crate::name::AttendeeName;
use chrono::{Local, NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;

pub const LEDGER_HEADER: &str = "Name,Date,Time";
const DATE_FORMAT: &str = "%Y-%m-%d";
const TIME_FORMAT: &str = "%H:%M:%S";

#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("ledger {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("ledger line {line}: {reason}")]
    Malformed { line: usize, reason: String },
}

/// Which existing records block a new mark for the same name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DuplicateScope {
    /// A name recorded on any date blocks the mark.
    #[default]
    AnyDate,
    /// Only a record dated today blocks the mark.
    SameDate,
}

impl FromStr for DuplicateScope {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "any-date" | "any_date" | "any" => Ok(Self::AnyDate),
            "same-date" | "same_date" | "same-day" | "today" => Ok(Self::SameDate),
            other => Err(format!("unknown duplicate scope {other:?} (expected any-date or same-date)")),
        }
    }
}

/// One line of the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttendanceRecord {
    pub name: String,
    pub date: NaiveDate,
    pub time: NaiveTime,
}

impl AttendanceRecord {
    fn to_line(&self) -> String {
        format!(
            "{},{},{}",
            self.name,
            self.date.format(DATE_FORMAT),
            self.time.format(TIME_FORMAT)
        )
    }

    fn parse_line(line: &str) -> Result<Self, String> {
        let fields: Vec<&str> = line.split(',').collect();
        let [name, date, time] = fields.as_slice() else {
            return Err(format!("expected 3 fields, got {}", fields.len()));
        };
        let date = NaiveDate::parse_from_str(date.trim(), DATE_FORMAT)
            .map_err(|e| format!("bad date {date:?}: {e}"))?;
        let time = NaiveTime::parse_from_str(time.trim(), TIME_FORMAT)
            .map_err(|e| format!("bad time {time:?}: {e}"))?;
        Ok(Self {
            name: name.to_string(),
            date,
            time,
        })
    }
}

/// Outcome of a mark attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MarkOutcome {
    /// A new record was appended.
    Marked(AttendanceRecord),
    /// The name was already present; the store is unchanged.
    AlreadyMarked,
}

impl MarkOutcome {
    pub fn is_marked(&self) -> bool {
        matches!(self, MarkOutcome::Marked(_))
    }
}

/// Owner of the ledger file. Opens the file for the duration of each call only.
#[derive(Debug, Clone)]
pub struct AttendanceLedger {
    path: PathBuf,
    scope: DuplicateScope,
}

impl AttendanceLedger {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            scope: DuplicateScope::default(),
        }
    }

    pub fn with_scope(mut self, scope: DuplicateScope) -> Self {
        self.scope = scope;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn scope(&self) -> DuplicateScope {
        self.scope
    }

    /// Mark `name` present at the current local time.
    pub fn mark_present(&self, name: &AttendeeName) -> Result<MarkOutcome, LedgerError> {
        self.mark_present_at(name, Local::now().naive_local())
    }

    /// Mark `name` present at `now`.
    pub fn mark_present_at(
        &self,
        name: &AttendeeName,
        now: NaiveDateTime,
    ) -> Result<MarkOutcome, LedgerError> {
        self.ensure_exists()?;

        let mut file = OpenOptions::new()
            .read(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| self.io_error(e))?;
        let mut contents = String::new();
        file.read_to_string(&mut contents)
            .map_err(|e| self.io_error(e))?;

        let today = now.date();
        let seen = data_lines(&contents).any(|(_, line)| {
            let mut fields = line.split(',');
            if fields.next() != Some(name.as_str()) {
                return false;
            }
            match self.scope {
                DuplicateScope::AnyDate => true,
                DuplicateScope::SameDate => fields
                    .next()
                    .and_then(|d| NaiveDate::parse_from_str(d.trim(), DATE_FORMAT).ok())
                    == Some(today),
            }
        });

        if seen {
            tracing::debug!(name = %name, scope = ?self.scope, "name already in ledger");
            return Ok(MarkOutcome::AlreadyMarked);
        }

        let record = AttendanceRecord {
            name: name.to_string(),
            date: today,
            time: now.time().with_nanosecond(0).unwrap_or(now.time()),
        };

        let mut chunk = String::new();
        if contents.trim().is_empty() {
            // Blank file: start over so the header lands on line 1.
            file.set_len(0).map_err(|e| self.io_error(e))?;
            chunk.push_str(LEDGER_HEADER);
            chunk.push('\n');
        } else if !contents.ends_with('\n') {
            chunk.push('\n');
        }
        chunk.push_str(&record.to_line());

        file.write_all(chunk.as_bytes())
            .and_then(|()| file.flush())
            .map_err(|e| self.io_error(e))?;

        tracing::info!(
            path = %self.path.display(),
            name = %record.name,
            date = %record.date,
            time = %record.time,
            "attendance recorded"
        );
        Ok(MarkOutcome::Marked(record))
    }

    /// Read every record back. A missing ledger reads as empty.
    pub fn records(&self) -> Result<Vec<AttendanceRecord>, LedgerError> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(self.io_error(e)),
        };

        data_lines(&contents)
            .map(|(line_no, line)| {
                AttendanceRecord::parse_line(line).map_err(|reason| LedgerError::Malformed {
                    line: line_no,
                    reason,
                })
            })
            .collect()
    }

    /// Create the ledger with only the header line if it does not exist yet.
    fn ensure_exists(&self) -> Result<(), LedgerError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| self.io_error(e))?;
        }

        match OpenOptions::new().write(true).create_new(true).open(&self.path) {
            Ok(mut file) => {
                file.write_all(LEDGER_HEADER.as_bytes())
                    .map_err(|e| self.io_error(e))?;
                tracing::info!(path = %self.path.display(), "created attendance ledger");
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => Ok(()),
            Err(e) => Err(self.io_error(e)),
        }
    }

    fn io_error(&self, source: io::Error) -> LedgerError {
        LedgerError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

/// Non-empty lines after the header, with 1-based line numbers. The header
/// is the first non-blank line when present.
fn data_lines(contents: &str) -> impl Iterator<Item = (usize, &str)> {
    let mut first = true;
    contents
        .lines()
        .enumerate()
        .map(|(i, line)| (i + 1, line.trim_end_matches('\r')))
        .filter(|(_, line)| !line.trim().is_empty())
        .filter(move |(_, line)| {
            let is_header = first && line.trim() == LEDGER_HEADER;
            first = false;
            !is_header
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn at(date: &str, time: &str) -> NaiveDateTime {
        NaiveDateTime::new(
            NaiveDate::parse_from_str(date, DATE_FORMAT).unwrap(),
            NaiveTime::parse_from_str(time, TIME_FORMAT).unwrap(),
        )
    }

    fn name(raw: &str) -> AttendeeName {
        AttendeeName::parse(raw).unwrap()
    }

    fn ledger_in(dir: &TempDir) -> AttendanceLedger {
        AttendanceLedger::new(dir.path().join("attendance.csv"))
    }

    #[test]
    fn test_first_mark_creates_file_with_header() {
        let dir = TempDir::new().unwrap();
        let ledger = ledger_in(&dir);
        assert!(!ledger.path().exists());

        let outcome = ledger
            .mark_present_at(&name("alice"), at("2024-06-01", "09:30:00"))
            .unwrap();

        assert!(outcome.is_marked());
        let contents = fs::read_to_string(ledger.path()).unwrap();
        assert_eq!(contents, "Name,Date,Time\nALICE,2024-06-01,09:30:00");
    }

    #[test]
    fn test_second_mark_same_run_is_noop() {
        let dir = TempDir::new().unwrap();
        let ledger = ledger_in(&dir);
        let alice = name("ALICE");

        let first = ledger.mark_present_at(&alice, at("2024-06-01", "09:30:00")).unwrap();
        let after_first = fs::read_to_string(ledger.path()).unwrap();
        let second = ledger.mark_present_at(&alice, at("2024-06-01", "09:45:10")).unwrap();

        assert!(first.is_marked());
        assert_eq!(second, MarkOutcome::AlreadyMarked);
        assert_eq!(fs::read_to_string(ledger.path()).unwrap(), after_first);
        assert_eq!(ledger.records().unwrap().len(), 1);
    }

    #[test]
    fn test_mark_present_uses_today() {
        let dir = TempDir::new().unwrap();
        let ledger = ledger_in(&dir);

        let before = Local::now().date_naive();
        let outcome = ledger.mark_present(&name("carol")).unwrap();
        let after = Local::now().date_naive();

        let MarkOutcome::Marked(record) = outcome else {
            panic!("expected a new record");
        };
        assert!(record.date == before || record.date == after);
        assert_eq!(record.name, "CAROL");
    }

    #[test]
    fn test_name_from_previous_day_blocks_mark() {
        let dir = TempDir::new().unwrap();
        let ledger = ledger_in(&dir);
        fs::write(ledger.path(), "Name,Date,Time\nBOB,2024-01-01,09:00:00").unwrap();

        let outcome = ledger
            .mark_present_at(&name("BOB"), at("2024-06-01", "08:00:00"))
            .unwrap();

        assert_eq!(outcome, MarkOutcome::AlreadyMarked);
        assert_eq!(
            fs::read_to_string(ledger.path()).unwrap(),
            "Name,Date,Time\nBOB,2024-01-01,09:00:00"
        );
    }

    #[test]
    fn test_same_date_scope_allows_new_day() {
        let dir = TempDir::new().unwrap();
        let ledger = ledger_in(&dir).with_scope(DuplicateScope::SameDate);
        fs::write(ledger.path(), "Name,Date,Time\nBOB,2024-01-01,09:00:00").unwrap();

        let bob = name("bob");
        let first = ledger.mark_present_at(&bob, at("2024-06-01", "08:00:00")).unwrap();
        let again = ledger.mark_present_at(&bob, at("2024-06-01", "17:00:00")).unwrap();

        assert!(first.is_marked());
        assert_eq!(again, MarkOutcome::AlreadyMarked);
        let dates: Vec<NaiveDate> = ledger.records().unwrap().into_iter().map(|r| r.date).collect();
        assert_eq!(dates, vec![at("2024-01-01", "00:00:00").date(), at("2024-06-01", "00:00:00").date()]);
    }

    #[test]
    fn test_other_names_do_not_block() {
        let dir = TempDir::new().unwrap();
        let ledger = ledger_in(&dir);
        fs::write(ledger.path(), "Name,Date,Time\nBOBBY,2024-06-01,09:00:00").unwrap();

        let outcome = ledger
            .mark_present_at(&name("BOB"), at("2024-06-01", "09:01:00"))
            .unwrap();
        assert!(outcome.is_marked());
    }

    #[test]
    fn test_records_round_trip() {
        let dir = TempDir::new().unwrap();
        let ledger = ledger_in(&dir);

        for (who, time) in [("alice", "09:00:01"), ("bob", "09:10:59"), ("dave", "23:59:59")] {
            ledger.mark_present_at(&name(who), at("2024-06-01", time)).unwrap();
        }

        let records = ledger.records().unwrap();
        assert_eq!(records.len(), 3);
        assert_eq!(
            records[1],
            AttendanceRecord {
                name: "BOB".into(),
                date: at("2024-06-01", "00:00:00").date(),
                time: NaiveTime::from_hms_opt(9, 10, 59).unwrap(),
            }
        );
    }

    #[test]
    fn test_subsecond_time_is_truncated() {
        let dir = TempDir::new().unwrap();
        let ledger = ledger_in(&dir);
        let now = at("2024-06-01", "10:00:00") + chrono::Duration::milliseconds(750);

        ledger.mark_present_at(&name("eve"), now).unwrap();

        let contents = fs::read_to_string(ledger.path()).unwrap();
        assert!(contents.ends_with("EVE,2024-06-01,10:00:00"), "{contents}");
    }

    #[test]
    fn test_append_after_trailing_newline() {
        let dir = TempDir::new().unwrap();
        let ledger = ledger_in(&dir);
        fs::write(ledger.path(), "Name,Date,Time\nBOB,2024-06-01,09:00:00\n").unwrap();

        ledger.mark_present_at(&name("alice"), at("2024-06-01", "09:05:00")).unwrap();

        assert_eq!(
            fs::read_to_string(ledger.path()).unwrap(),
            "Name,Date,Time\nBOB,2024-06-01,09:00:00\nALICE,2024-06-01,09:05:00"
        );
    }

    #[test]
    fn test_empty_existing_file_gets_header() {
        let dir = TempDir::new().unwrap();
        let ledger = ledger_in(&dir);
        fs::write(ledger.path(), "").unwrap();

        ledger.mark_present_at(&name("alice"), at("2024-06-01", "09:05:00")).unwrap();

        assert_eq!(
            fs::read_to_string(ledger.path()).unwrap(),
            "Name,Date,Time\nALICE,2024-06-01,09:05:00"
        );
    }

    #[test]
    fn test_whitespace_only_file_gets_header() {
        let dir = TempDir::new().unwrap();
        let ledger = ledger_in(&dir);
        fs::write(ledger.path(), "\n").unwrap();

        ledger.mark_present_at(&name("alice"), at("2024-06-01", "09:00:00")).unwrap();

        assert_eq!(
            fs::read_to_string(ledger.path()).unwrap(),
            "Name,Date,Time\nALICE,2024-06-01,09:00:00"
        );
        let records = ledger.records().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].name, "ALICE");
    }

    #[test]
    fn test_records_skips_header_after_blank_lines() {
        let dir = TempDir::new().unwrap();
        let ledger = ledger_in(&dir);
        fs::write(ledger.path(), "\n\nName,Date,Time\nBOB,2024-06-01,09:00:00").unwrap();

        let records = ledger.records().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].name, "BOB");

        let outcome = ledger.mark_present_at(&name("bob"), at("2024-06-02", "09:00:00")).unwrap();
        assert_eq!(outcome, MarkOutcome::AlreadyMarked);
    }

    #[test]
    fn test_creates_missing_parent_directory() {
        let dir = TempDir::new().unwrap();
        let ledger = AttendanceLedger::new(dir.path().join("logs").join("attendance.csv"));

        ledger.mark_present_at(&name("alice"), at("2024-06-01", "09:05:00")).unwrap();
        assert_eq!(ledger.records().unwrap().len(), 1);
    }

    #[test]
    fn test_records_missing_file_is_empty() {
        let dir = TempDir::new().unwrap();
        assert!(ledger_in(&dir).records().unwrap().is_empty());
    }

    #[test]
    fn test_records_reports_malformed_line() {
        let dir = TempDir::new().unwrap();
        let ledger = ledger_in(&dir);
        fs::write(ledger.path(), "Name,Date,Time\nBOB,2024-06-01,09:00:00\nBROKEN").unwrap();

        match ledger.records() {
            Err(LedgerError::Malformed { line, .. }) => assert_eq!(line, 3),
            other => panic!("expected malformed line error, got {other:?}"),
        }
    }

    #[test]
    fn test_records_accepts_crlf() {
        let dir = TempDir::new().unwrap();
        let ledger = ledger_in(&dir);
        fs::write(ledger.path(), "Name,Date,Time\r\nBOB,2024-06-01,09:00:00\r\n").unwrap();

        let records = ledger.records().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].name, "BOB");
    }

    #[test]
    fn test_duplicate_scope_from_str() {
        assert_eq!("any-date".parse::<DuplicateScope>(), Ok(DuplicateScope::AnyDate));
        assert_eq!("Same-Date".parse::<DuplicateScope>(), Ok(DuplicateScope::SameDate));
        assert!("weekly".parse::<DuplicateScope>().is_err());
    }
}
