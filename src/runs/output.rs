//! Streaming parser for the driver script report.
//!
//! An [`OutputCapture`] is fed one line at a time while the R process is still running. It looks for its marker,
//! reads the `start end steps` header on the following line and then collects `steps` timestamps. Anything printed
//! before the marker is ignored, the runtime is free to chatter.

use serde::{Deserialize, Serialize};

use crate::errors::Error;

/// Parser state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum State {
    /// Looking for the marker line.
    Scanning,
    /// The marker was seen, the next line is the header.
    ReadingHeader,
    /// Collecting timestamps; terminal.
    ReadingTimestamps,
}

/// Parsed report of one timed loop.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Report {
    /// Wall-clock time the loop started at, in seconds.
    pub start_time: f64,
    /// Wall-clock time the loop ended at, in seconds.
    pub end_time: f64,
    /// Number of steps the loop reported.
    pub steps: u64,
    /// One timestamp per completed step.
    pub timestamps: Vec<f64>,
}

/// Incremental consumer of the driver script output.
#[derive(Debug)]
pub struct OutputCapture {
    marker: &'static str,
    state: State,
    start_time: f64,
    end_time: f64,
    steps: u64,
    timestamps: Vec<f64>,
}

impl OutputCapture {
    /// Creates a capture looking for lines starting with `marker`.
    #[must_use]
    pub fn new(marker: &'static str) -> Self {
        Self {
            marker,
            state: State::Scanning,
            start_time: 0.0,
            end_time: 0.0,
            steps: 0,
            timestamps: Vec::new(),
        }
    }

    /// Current parser state.
    #[must_use]
    pub fn state(&self) -> State {
        self.state
    }

    /// Marker this capture is looking for.
    #[must_use]
    pub fn marker(&self) -> &'static str {
        self.marker
    }

    /// Consumes one output line.
    ///
    /// # Errors
    ///
    /// If the header is not exactly three numeric fields, or a timestamp line is not a number.
    pub fn feed(&mut self, line: &str) -> Result<(), Error> {
        match self.state {
            State::Scanning => self.scan(line),
            State::ReadingHeader => self.read_header(line),
            State::ReadingTimestamps => self.read_timestamp(line),
        }
    }

    fn scan(&mut self, line: &str) -> Result<(), Error> {
        if line.starts_with(self.marker) {
            self.state = State::ReadingHeader;
        }
        Ok(())
    }

    fn read_header(&mut self, line: &str) -> Result<(), Error> {
        let malformed = || Error::MalformedHeader {
            line: line.to_string(),
        };

        let fields: Vec<&str> = line.split_whitespace().collect();
        let [start, end, steps] = fields.as_slice() else {
            return Err(malformed());
        };
        self.start_time = start.parse().map_err(|_| malformed())?;
        self.end_time = end.parse().map_err(|_| malformed())?;
        self.steps = steps.parse().map_err(|_| malformed())?;

        // Bounded so a degenerate report cannot make us reserve the whole buffer up front.
        let capacity = usize::try_from(self.steps.min(1 << 20)).unwrap_or_default();
        self.timestamps = Vec::with_capacity(capacity);
        self.state = State::ReadingTimestamps;
        Ok(())
    }

    fn read_timestamp(&mut self, line: &str) -> Result<(), Error> {
        let line = line.trim();
        if line.is_empty() || self.timestamps.len() as u64 >= self.steps {
            return Ok(());
        }
        let timestamp = line.parse().map_err(|_| Error::MalformedTimestamp {
            line: line.to_string(),
        })?;
        self.timestamps.push(timestamp);
        Ok(())
    }

    /// Finalizes the capture once the process has exited.
    ///
    /// # Errors
    ///
    /// If the marker or the header was never seen.
    pub fn finish(self) -> Result<Report, Error> {
        if self.state != State::ReadingTimestamps {
            return Err(Error::MissingResults {
                marker: self.marker,
            });
        }
        Ok(Report {
            start_time: self.start_time,
            end_time: self.end_time,
            steps: self.steps,
            timestamps: self.timestamps,
        })
    }
}
