//! Identifiers of the detector data-taking timeline.
//!
//! A run is one continuous data-taking period; each run is cut into
//! lumisections, the finest time slice DQM histograms are booked for.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::DqmError;

/// Run number as assigned by the experiment's run registry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunNumber(pub i32);

/// Lumisection number, 1-based within its run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LsNumber(pub i32);

/// A lumisection addressed by its run and its number within the run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LumisectionKey {
    pub run: RunNumber,
    pub ls: LsNumber,
}

impl RunNumber {
    pub fn get(self) -> i32 {
        self.0
    }
}

impl LsNumber {
    pub fn get(self) -> i32 {
        self.0
    }
}

impl LumisectionKey {
    pub fn new(run: RunNumber, ls: LsNumber) -> Self {
        Self { run, ls }
    }
}

impl fmt::Display for RunNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for LsNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for LumisectionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.run, self.ls)
    }
}

impl FromStr for RunNumber {
    type Err = DqmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse()
            .map(RunNumber)
            .map_err(|_| DqmError::validation(format!("invalid run number '{}'", s)))
    }
}

impl FromStr for LsNumber {
    type Err = DqmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse()
            .map(LsNumber)
            .map_err(|_| DqmError::validation(format!("invalid lumisection number '{}'", s)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_trimmed_numbers() {
        assert_eq!(" 297057 ".parse::<RunNumber>().unwrap(), RunNumber(297057));
        assert_eq!("12".parse::<LsNumber>().unwrap(), LsNumber(12));
    }

    #[test]
    fn rejects_non_numeric() {
        let err = "run-1".parse::<RunNumber>().unwrap_err();
        assert!(err.to_string().contains("invalid run number"));
    }

    #[test]
    fn key_display_and_order() {
        let a = LumisectionKey::new(RunNumber(297057), LsNumber(2));
        let b = LumisectionKey::new(RunNumber(297057), LsNumber(10));
        assert_eq!(a.to_string(), "297057:2");
        assert!(a < b);
    }
}
