use std::error::Error;
use std::fmt::{Display, Formatter};
use std::io;

/// Outcome of a batch-level call or of processing a single window.
///
/// The numeric code of each variant is its declaration order, and is stable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum StatusType {
    #[default]
    Success,
    ExceededMaximumPoas,
    ExceededMaximumSequenceSize,
    ExceededMaximumSequencesPerPoa,
    ExceededBatchSize,
    NodeCountExceededMaximumGraphSize,
    EdgeCountExceededMaximumGraphSize,
    SeqLenExceededMaximumNodesPerWindow,
    LoopCountExceededUpperBound,
    OutputTypeUnavailable,
    GenericError,
}

impl StatusType {
    const ALL: [StatusType; 11] = [
        Self::Success,
        Self::ExceededMaximumPoas,
        Self::ExceededMaximumSequenceSize,
        Self::ExceededMaximumSequencesPerPoa,
        Self::ExceededBatchSize,
        Self::NodeCountExceededMaximumGraphSize,
        Self::EdgeCountExceededMaximumGraphSize,
        Self::SeqLenExceededMaximumNodesPerWindow,
        Self::LoopCountExceededUpperBound,
        Self::OutputTypeUnavailable,
        Self::GenericError,
    ];

    pub fn code(&self) -> u32 {
        *self as u32
    }

    pub fn is_success(&self) -> bool {
        *self == Self::Success
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::ExceededMaximumPoas => "exceeded_maximum_poas",
            Self::ExceededMaximumSequenceSize => "exceeded_maximum_sequence_size",
            Self::ExceededMaximumSequencesPerPoa => "exceeded_maximum_sequences_per_poa",
            Self::ExceededBatchSize => "exceeded_batch_size",
            Self::NodeCountExceededMaximumGraphSize => "node_count_exceeded_maximum_graph_size",
            Self::EdgeCountExceededMaximumGraphSize => "edge_count_exceeded_maximum_graph_size",
            Self::SeqLenExceededMaximumNodesPerWindow => "seq_len_exceeded_maximum_nodes_per_window",
            Self::LoopCountExceededUpperBound => "loop_count_exceeded_upper_bound",
            Self::OutputTypeUnavailable => "output_type_unavailable",
            Self::GenericError => "generic_error",
        }
    }
}

impl TryFrom<u32> for StatusType {
    type Error = PoaBatchError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        Self::ALL
            .get(value as usize)
            .copied()
            .ok_or(PoaBatchError::UnknownStatus(value))
    }
}

impl Display for StatusType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Error for StatusType {}

#[derive(Debug)]
pub enum PoaBatchError {
    /// The given numeric code does not correspond to any status
    UnknownStatus(u32),

    /// The batch configuration is not usable
    InvalidConfig(String),

    /// Could not parse a configuration file
    ConfigParseError { source: serde_json::Error },

    /// Error variant when we couldn't read from a file
    FileReadError { source: io::Error },

    /// Other IO errors
    IOError(io::Error),
}

impl Error for PoaBatchError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match *self {
            Self::ConfigParseError { ref source } => Some(source),
            Self::FileReadError { ref source } => Some(source),
            Self::IOError(ref source) => Some(source),
            _ => None
        }
    }
}

impl From<io::Error> for PoaBatchError {
    fn from(value: io::Error) -> Self {
        Self::IOError(value)
    }
}

impl From<serde_json::Error> for PoaBatchError {
    fn from(value: serde_json::Error) -> Self {
        Self::ConfigParseError {
            source: value
        }
    }
}

impl Display for PoaBatchError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match *self {
            Self::UnknownStatus(code) =>
                write!(f, "Given status type is unknown: {code}"),
            Self::InvalidConfig(ref reason) =>
                write!(f, "Invalid batch configuration: {reason}"),
            Self::ConfigParseError { source: _ } =>
                write!(f, "Could not parse the batch configuration file!"),
            Self::FileReadError { source: _ } =>
                write!(f, "Could not read from file!"),
            Self::IOError(ref err) =>
                err.fmt(f),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::error::Error;
    use std::io;

    use super::{PoaBatchError, StatusType};

    #[test]
    fn test_status_strings() {
        assert_eq!(StatusType::Success.to_string(), "success");
        assert_eq!(StatusType::ExceededBatchSize.to_string(), "exceeded_batch_size");
        assert_eq!(
            StatusType::SeqLenExceededMaximumNodesPerWindow.as_str(),
            "seq_len_exceeded_maximum_nodes_per_window"
        );
        assert_eq!(StatusType::GenericError.as_str(), "generic_error");
    }

    #[test]
    fn test_status_codes() {
        for (code, status) in StatusType::ALL.iter().enumerate() {
            assert_eq!(status.code(), code as u32);
            assert_eq!(StatusType::try_from(code as u32).unwrap(), *status);
        }

        assert_eq!(StatusType::GenericError.code(), 10);
        assert!(matches!(StatusType::try_from(11), Err(PoaBatchError::UnknownStatus(11))));
    }

    #[test]
    fn test_error_sources() {
        let err = PoaBatchError::from(io::Error::new(io::ErrorKind::NotFound, "missing"));
        assert!(err.source().is_some());
        assert_eq!(err.to_string(), "missing");

        let err = PoaBatchError::InvalidConfig("max_sequence_size must be larger than zero".to_string());
        assert!(err.source().is_none());
        assert_eq!(err.to_string(), "Invalid batch configuration: max_sequence_size must be larger than zero");

        let err = PoaBatchError::UnknownStatus(42);
        assert!(err.source().is_none());
    }
}
