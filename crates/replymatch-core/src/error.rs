use std::fmt;
use std::path::PathBuf;

/// Machine-readable error codes for callers that branch on failure kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    ConfigReadFailed,
    ConfigParseError,
    ConfigInvalid,
    InvalidExpansionRule,
    CorpusReadFailed,
    CorpusParseError,
    EmptyAnswer,
    RankingCancelled,
    InternalUnexpected,
}

impl ErrorCode {
    /// Stable code identifier (`E####`) for machine parsing.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::ConfigReadFailed => "E1001",
            Self::ConfigParseError => "E1002",
            Self::ConfigInvalid => "E1003",
            Self::InvalidExpansionRule => "E1004",
            Self::CorpusReadFailed => "E2001",
            Self::CorpusParseError => "E2002",
            Self::EmptyAnswer => "E2003",
            Self::RankingCancelled => "E3001",
            Self::InternalUnexpected => "E9001",
        }
    }

    /// Short human-facing summary for logs and terminal output.
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::ConfigReadFailed => "Config file could not be read",
            Self::ConfigParseError => "Config file parse error",
            Self::ConfigInvalid => "Config values out of range",
            Self::InvalidExpansionRule => "Normalizer rule pattern does not compile",
            Self::CorpusReadFailed => "Corpus file could not be read",
            Self::CorpusParseError => "Corpus file parse error",
            Self::EmptyAnswer => "Corpus record has no answer text",
            Self::RankingCancelled => "Ranking cancelled",
            Self::InternalUnexpected => "Internal unexpected error",
        }
    }

    /// Optional remediation hint for operators.
    #[must_use]
    pub const fn hint(self) -> Option<&'static str> {
        match self {
            Self::ConfigReadFailed => Some("Check the --config path and file permissions."),
            Self::ConfigParseError => Some("Fix the TOML syntax in replymatch.toml and retry."),
            Self::ConfigInvalid => {
                Some("Fusion weights must sum to 1 and thresholds must lie in [0, 100].")
            }
            Self::InvalidExpansionRule => {
                Some("Check the regex syntax of [[normalizer.rules]] patterns.")
            }
            Self::CorpusReadFailed => Some("Check the --corpus path and file permissions."),
            Self::CorpusParseError => {
                Some("Corpus files must be a JSON array, an object with `items`, or JSON Lines.")
            }
            Self::EmptyAnswer => Some("Every record needs a non-empty answer field."),
            Self::RankingCancelled => None,
            Self::InternalUnexpected => Some("Retry once. If persistent, report a bug with logs."),
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Errors raised by configuration loading, normalization setup and ingestion.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("failed to read {path}: {source}")]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid configuration: {0}")]
    ConfigInvalid(String),

    #[error("expansion rule `{pattern}` does not compile: {source}")]
    InvalidRule {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("failed to read corpus {path}: {source}")]
    CorpusRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse corpus {path}: {detail}")]
    CorpusParse { path: PathBuf, detail: String },

    #[error("corpus record {source_id} has no answer text")]
    EmptyAnswer { source_id: String },
}

impl CoreError {
    /// The stable [`ErrorCode`] for this error.
    #[must_use]
    pub const fn error_code(&self) -> ErrorCode {
        match self {
            Self::ConfigRead { .. } => ErrorCode::ConfigReadFailed,
            Self::ConfigParse { .. } => ErrorCode::ConfigParseError,
            Self::ConfigInvalid(_) => ErrorCode::ConfigInvalid,
            Self::InvalidRule { .. } => ErrorCode::InvalidExpansionRule,
            Self::CorpusRead { .. } => ErrorCode::CorpusReadFailed,
            Self::CorpusParse { .. } => ErrorCode::CorpusParseError,
            Self::EmptyAnswer { .. } => ErrorCode::EmptyAnswer,
        }
    }

    /// Remediation hint, falling back to the generic code message.
    #[must_use]
    pub fn suggestion(&self) -> String {
        let code = self.error_code();
        code.hint().unwrap_or_else(|| code.message()).to_string()
    }
}
