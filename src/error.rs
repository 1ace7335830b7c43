use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid package: {0}\n\n\
             Hint: package names look like 'author/name', e.g. 'elm/http'.\n\n\
             Possible causes:\n\
             1. A typo in the package name (check the suggestions above, if any)\n\
             2. The package is not in the registry\n\
             3. The requested version was never published")]
    InvalidPackage(String),

    #[error("No valid solution: {0}\n\n\
             Hint: the declared dependencies cannot all be satisfied at once.\n\n\
             Possible solutions:\n\
             1. Relax the version of the package you are installing\n\
             2. Run 'elmpm upgrade' to move existing dependencies forward\n\
             3. Remove a conflicting dependency and try again")]
    NoSolution(String),

    #[error("No offline solution\n\n\
             Hint: elmpm is in offline mode and the local registry is missing\n\
             or cannot satisfy this operation.\n\n\
             Unset ELMPM_OFFLINE (or connect to the network) and retry.")]
    NoOfflineSolution,

    #[error("Network error: {0}\n\n\
             Hint: the package registry could not be reached.\n\
             Nothing was written; retry once the connection is back.")]
    Network(String),

    #[error("Parse error in {file}: {message}")]
    Parse { file: String, message: String },

    #[error("File system error: {0}")]
    Fs(String),
}

impl Error {
    /// Parse error for a named file.
    pub fn parse(file: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Parse {
            file: file.into(),
            message: message.into(),
        }
    }
}
