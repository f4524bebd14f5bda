#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("bad slot stamp {0:?}")]
    SlotFormat(String),

    #[error("unreadable input {path}: {reason}")]
    Input { path: String, reason: String },

    #[error("parse failure in {path}: {reason}")]
    Parse { path: String, reason: String },

    #[error("unsupported output extension: {0}")]
    OutputExtension(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    NetCdf(#[from] netcdf::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error("Config invalid: {0}")]
    ConfigInvalid(String),

    #[error("Failed to load config: {}", .source)]
    ConfigLoad {
        #[from]
        source: serde_yaml::Error,
    },
}

impl Error {
    pub fn parse(path: &std::path::Path, reason: impl Into<String>) -> Self {
        Error::Parse {
            path: path.display().to_string(),
            reason: reason.into(),
        }
    }

    pub fn input(path: &std::path::Path, reason: impl Into<String>) -> Self {
        Error::Input {
            path: path.display().to_string(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
