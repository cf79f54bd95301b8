//! Run-time counters and the CSV history stream.
//!
//! When enabled on a machine, a [`RunLog`] counts state entries, event
//! fires (including the two synthetic indices for timeout and inner
//! transitions) and ignored events, and appends one CSV row per
//! transition to a configurable sink. The sink is opened lazily on the
//! first transition; open and write failures surface as
//! [`RuntimeError`]s from the runtime call that triggered them.

use crate::core::Labels;
use crate::error::RuntimeError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;

/// Default history file, next to the process working directory.
pub const DEFAULT_HISTORY_FILE: &str = "signalbox.csv";

/// Which sections [`RunLog::print_data`] renders.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct PrintFlags {
    pub state_counts: bool,
    pub event_counts: bool,
    pub history: bool,
}

impl PrintFlags {
    /// Every section.
    pub const ALL: Self = Self {
        state_counts: true,
        event_counts: true,
        history: true,
    };
}

impl Default for PrintFlags {
    fn default() -> Self {
        Self::ALL
    }
}

/// One logged transition: elapsed time since the log was created, the
/// event index that caused it (synthetic indices included) and the state
/// that was entered.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HistoryRecord {
    pub elapsed_secs: f64,
    pub event: usize,
    pub state: usize,
}

enum HistorySink {
    /// Opened lazily on the first transition.
    LazyFile(PathBuf),
    Open(Box<dyn Write + Send>),
}

/// Counters and history for one machine run.
pub struct RunLog {
    state_counter: Vec<u64>,
    event_counter: Vec<u64>,
    ignored_counter: Vec<u64>,
    started_at: DateTime<Utc>,
    history: Vec<HistoryRecord>,
    sink: Option<HistorySink>,
    header_written: bool,
}

impl RunLog {
    pub(crate) fn new(states: usize, events: usize) -> Self {
        Self {
            state_counter: vec![0; states],
            // two extra slots for timeout and inner transitions
            event_counter: vec![0; events + 2],
            ignored_counter: vec![0; events],
            started_at: Utc::now(),
            history: Vec::new(),
            sink: Some(HistorySink::LazyFile(PathBuf::from(DEFAULT_HISTORY_FILE))),
            header_written: false,
        }
    }

    /// Send the CSV history to `path` instead of the default file.
    pub fn set_history_file(&mut self, path: impl Into<PathBuf>) {
        self.sink = Some(HistorySink::LazyFile(path.into()));
        self.header_written = false;
    }

    /// Send the CSV history to an arbitrary writer.
    pub fn set_history_writer(&mut self, writer: Box<dyn Write + Send>) {
        self.sink = Some(HistorySink::Open(writer));
        self.header_written = false;
    }

    /// Keep counters and in-memory history but write no CSV.
    pub fn disable_history_output(&mut self) {
        self.sink = None;
    }

    /// How often the state at `index` was entered.
    pub fn state_entries(&self, index: usize) -> u64 {
        self.state_counter.get(index).copied().unwrap_or(0)
    }

    /// How often the event at `index` fired; `events` and `events + 1`
    /// are the synthetic timeout and inner-transition indices.
    pub fn event_fires(&self, index: usize) -> u64 {
        self.event_counter.get(index).copied().unwrap_or(0)
    }

    /// How often the event at `index` was delivered but ignored.
    pub fn ignored(&self, index: usize) -> u64 {
        self.ignored_counter.get(index).copied().unwrap_or(0)
    }

    /// Every logged transition, in order.
    pub fn records(&self) -> &[HistoryRecord] {
        &self.history
    }

    /// When this log started counting.
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub(crate) fn record_initial_entry(&mut self) {
        if let Some(slot) = self.state_counter.first_mut() {
            *slot = 1;
        }
    }

    pub(crate) fn log_ignored(&mut self, event: usize) {
        if let Some(slot) = self.ignored_counter.get_mut(event) {
            *slot += 1;
        }
    }

    pub(crate) fn log_transition(
        &mut self,
        state: usize,
        event: usize,
        labels: &Labels,
    ) -> Result<(), RuntimeError> {
        self.event_counter[event] += 1;
        self.state_counter[state] += 1;
        let elapsed = Utc::now().signed_duration_since(self.started_at);
        let elapsed_secs = elapsed.num_microseconds().map_or_else(
            || elapsed.num_milliseconds() as f64 / 1e3,
            |us| us as f64 / 1e6,
        );
        let record = HistoryRecord {
            elapsed_secs,
            event,
            state,
        };
        self.history.push(record);
        self.write_csv_row(record, labels)
    }

    fn write_csv_row(&mut self, record: HistoryRecord, labels: &Labels) -> Result<(), RuntimeError> {
        let Some(sink) = self.sink.take() else {
            return Ok(());
        };
        let mut writer = match sink {
            HistorySink::LazyFile(path) => {
                let file = File::create(&path)?;
                Box::new(BufWriter::new(file)) as Box<dyn Write + Send>
            }
            HistorySink::Open(writer) => writer,
        };
        if !self.header_written {
            writeln!(writer, "# FSM run history:")?;
            writeln!(writer, "#time;event;event_string;state;state_string")?;
            self.header_written = true;
        }
        writeln!(
            writer,
            "{:.6};{};{};{};{}",
            record.elapsed_secs,
            record.event,
            labels.event(record.event),
            record.state,
            labels.state(record.state)
        )?;
        writer.flush()?;
        self.sink = Some(HistorySink::Open(writer));
        Ok(())
    }

    /// Dump the selected sections, one CSV-ish block per flag.
    pub fn print_data(
        &self,
        out: &mut impl io::Write,
        flags: PrintFlags,
        labels: &Labels,
    ) -> io::Result<()> {
        if flags.state_counts {
            writeln!(out, "# State counters:")?;
            for (i, count) in self.state_counter.iter().enumerate() {
                writeln!(out, "{i};{};{count}", labels.state(i))?;
            }
        }
        if flags.event_counts {
            writeln!(out, "\n# Event counters:")?;
            for (i, count) in self.event_counter.iter().enumerate() {
                writeln!(out, "{i};{};{count}", labels.event(i))?;
            }
            writeln!(out, "\n# Ignored event counters:")?;
            for (i, count) in self.ignored_counter.iter().enumerate() {
                writeln!(out, "{i};{};{count}", labels.event(i))?;
            }
        }
        if flags.history {
            writeln!(out, "\n# Run history:")?;
            writeln!(out, "#time;event;event_string;state;state_string")?;
            for r in &self.history {
                writeln!(
                    out,
                    "{:.6};{};{};{};{}",
                    r.elapsed_secs,
                    r.event,
                    labels.event(r.event),
                    r.state,
                    labels.state(r.state)
                )?;
            }
        }
        Ok(())
    }
}
