use std::fmt;

#[derive(Debug, Clone)]
pub enum RefTrackError {
    FileOperation(String),
    Serialization(String),
    DateParse(String),
    Config(String),
}

impl RefTrackError {
    pub fn code(&self) -> &'static str {
        match self {
            RefTrackError::FileOperation(_) => "E001",
            RefTrackError::Serialization(_) => "E002",
            RefTrackError::DateParse(_) => "E003",
            RefTrackError::Config(_) => "E004",
        }
    }

    pub fn error_type(&self) -> &'static str {
        match self {
            RefTrackError::FileOperation(_) => "File Operation Error",
            RefTrackError::Serialization(_) => "Serialization Error",
            RefTrackError::DateParse(_) => "Date Parse Error",
            RefTrackError::Config(_) => "Configuration Error",
        }
    }

    pub fn message(&self) -> &str {
        match self {
            RefTrackError::FileOperation(msg) => msg,
            RefTrackError::Serialization(msg) => msg,
            RefTrackError::DateParse(msg) => msg,
            RefTrackError::Config(msg) => msg,
        }
    }
}

impl fmt::Display for RefTrackError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.error_type(), self.message())
    }
}

impl std::error::Error for RefTrackError {}

impl RefTrackError {
    pub fn file_operation<T: Into<String>>(msg: T) -> Self {
        RefTrackError::FileOperation(msg.into())
    }

    pub fn serialization<T: Into<String>>(msg: T) -> Self {
        RefTrackError::Serialization(msg.into())
    }

    pub fn config<T: Into<String>>(msg: T) -> Self {
        RefTrackError::Config(msg.into())
    }
}

impl From<std::io::Error> for RefTrackError {
    fn from(err: std::io::Error) -> Self {
        RefTrackError::FileOperation(err.to_string())
    }
}

impl From<serde_json::Error> for RefTrackError {
    fn from(err: serde_json::Error) -> Self {
        RefTrackError::Serialization(err.to_string())
    }
}

impl From<chrono::ParseError> for RefTrackError {
    fn from(err: chrono::ParseError) -> Self {
        RefTrackError::DateParse(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, RefTrackError>;
