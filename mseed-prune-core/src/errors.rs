use crate::time::Time;

/// Basic Error types.
#[derive(Debug)]
pub enum PruneError {
    /// IoError from the std library.
    StdIoError(std::io::Error),
    /// A wrapped memory map error.
    MapFile(std::io::Error),
    /// Enum creation error.
    ParseEnum { what: &'static str, code: u16 },
    /// File is too short to contain even one record header.
    FileTooShort { path: String },
    /// Record length exceeds the emitter's scratch buffer.
    BufferOverflow { length: usize, capacity: usize },
    /// The codec reported an error while unpacking a record during indexing.
    CodecIndexError { offset: u64, msg: String },
    /// The codec reported an error while repacking a trimmed record.
    CodecRepackError { msg: String },
    /// A trim precondition (`newstart`/`newend` inside `(start, end)`,
    /// `newstart < newend`) was violated.
    InvalidTrim {
        start: Time,
        end: Time,
        newstart: Option<Time>,
        newend: Option<Time>,
    },
    /// An invariant internal to the pipeline (e.g. a record belonging to two
    /// `RecordMap`s) was violated.
    InvariantViolation { msg: String },
    /// A configured regex could not be compiled.
    InvalidRegex(regex::Error),
    #[cfg(feature = "to_json")]
    /// Serialisation/Deserialisation error.
    SerdeError(serde_json::Error),
}

impl From<std::io::Error> for PruneError {
    fn from(e: std::io::Error) -> Self {
        Self::StdIoError(e)
    }
}

impl From<regex::Error> for PruneError {
    fn from(e: regex::Error) -> Self {
        Self::InvalidRegex(e)
    }
}

impl std::fmt::Display for PruneError {
    fn fmt(&self, fmt: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        use self::PruneError::*;
        match self {
            #[cfg(feature = "to_json")]
            SerdeError(x) => write!(fmt, "{}", x),
            StdIoError(x) => write!(fmt, "{}", x),
            MapFile(e) => write!(fmt, "could not create file map: {}", e),
            ParseEnum { what, code } => write!(fmt, "could not parse {} from code {}", what, code),
            FileTooShort { path } => write!(fmt, "file too short to contain a record: {}", path),
            BufferOverflow { length, capacity } => write!(
                fmt,
                "record length ({} bytes) exceeds scratch buffer ({} bytes)",
                length, capacity
            ),
            CodecIndexError { offset, msg } => {
                write!(fmt, "codec error at offset {}: {}", offset, msg)
            }
            CodecRepackError { msg } => write!(fmt, "codec repack error: {}", msg),
            InvalidTrim {
                start,
                end,
                newstart,
                newend,
            } => write!(
                fmt,
                "trim ({:?}, {:?}) invalid for record [{}, {}]",
                newstart, newend, start, end
            ),
            InvariantViolation { msg } => write!(fmt, "invariant violation: {}", msg),
            InvalidRegex(e) => write!(fmt, "{}", e),
        }
    }
}

impl From<PruneError> for String {
    fn from(e: PruneError) -> String {
        e.to_string()
    }
}

impl std::error::Error for PruneError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        use self::PruneError::*;
        match self {
            #[cfg(feature = "to_json")]
            SerdeError(x) => x.source(),
            StdIoError(x) | MapFile(x) => x.source(),
            InvalidRegex(x) => x.source(),
            _ => None,
        }
    }
}
