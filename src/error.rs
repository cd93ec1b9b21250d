//! Crate-level error type.

use std::fmt;

use crate::config::ConfigError;
use crate::measurement::CounterError;
use crate::suites::UnknownSuite;
use crate::topology::TopologyError;

/// Anything that can stop a sweep.
#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    /// The configuration was rejected.
    Config(ConfigError),
    /// Counter bind or read failed.
    Counter(CounterError),
    /// A graph could not be built, verified or walked.
    Topology(TopologyError),
    /// A suite name did not match any suite.
    UnknownSuite(UnknownSuite),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Config(e) => write!(f, "invalid configuration: {}", e),
            Error::Counter(e) => write!(f, "{}", e),
            Error::Topology(e) => write!(f, "topology: {}", e),
            Error::UnknownSuite(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Config(e) => Some(e),
            Error::Counter(e) => Some(e),
            Error::Topology(e) => Some(e),
            Error::UnknownSuite(e) => Some(e),
        }
    }
}

impl From<ConfigError> for Error {
    fn from(e: ConfigError) -> Self {
        Error::Config(e)
    }
}

impl From<CounterError> for Error {
    fn from(e: CounterError) -> Self {
        Error::Counter(e)
    }
}

impl From<TopologyError> for Error {
    fn from(e: TopologyError) -> Self {
        Error::Topology(e)
    }
}

impl From<UnknownSuite> for Error {
    fn from(e: UnknownSuite) -> Self {
        Error::UnknownSuite(e)
    }
}
