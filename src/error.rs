//! Error types shared by the library modules.
//!
//! Only `main` decides to print and exit; everything below it returns a
//! [`KelpError`].

use std::io;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum KelpError {
    /// No registry record matches the query.
    #[error("package '{0}' not found in config, try adding it first")]
    PackageNotFound(String),

    /// A bare repo name matched records from more than one owner.
    #[error("'{query}' is ambiguous, use one of: {}", candidates.join(", "))]
    AmbiguousPackage {
        query: String,
        candidates: Vec<String>,
    },

    /// `add` of an `(owner, repo)` pair that is already registered.
    #[error("package {owner}/{repo} already exists in config")]
    PackageExists { owner: String, repo: String },

    #[error("invalid package '{0}', use owner/repo format")]
    InvalidPackageSpec(String),

    #[error("release '{tag}' not found for {repo}")]
    ReleaseNotFound { repo: String, tag: String },

    #[error("no suitable asset found in release {release}")]
    NoSuitableAsset { release: String },

    /// Non-2xx answer from the release API or a download host.
    #[error("invalid HTTP status {status} from {url}: {body}")]
    Http {
        url: String,
        status: u16,
        body: String,
    },

    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("unsupported archive format: {0}")]
    UnsupportedFormat(String),

    #[error("extraction of {path} failed: {reason}")]
    Extract { path: PathBuf, reason: String },

    #[error("no {content_type} executable found in {artifact}")]
    NoExecutable {
        artifact: String,
        content_type: String,
    },

    #[error("unsupported platform: {os}/{arch}")]
    UnsupportedPlatform { os: String, arch: String },

    #[error("update is not supported for http packages ({0})")]
    HttpPackageUpdate(String),

    #[error("{0}")]
    Config(String),

    #[error("{}: {source}", path.display())]
    Io { path: PathBuf, source: io::Error },
}

impl KelpError {
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        KelpError::Io {
            path: path.into(),
            source,
        }
    }

    pub fn extract(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        KelpError::Extract {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    /// Transient failures worth another attempt: connection problems and
    /// server-side errors. Client errors (4xx) are final.
    pub fn is_transient(&self) -> bool {
        match self {
            KelpError::Http { status, .. } => *status >= 500,
            KelpError::Request(e) => e.is_connect() || e.is_timeout() || e.is_request(),
            _ => false,
        }
    }
}

/// Attaches a path to raw I/O errors.
pub trait IoContext<T> {
    fn at(self, path: impl Into<PathBuf>) -> std::result::Result<T, KelpError>;
}

impl<T> IoContext<T> for std::result::Result<T, io::Error> {
    fn at(self, path: impl Into<PathBuf>) -> std::result::Result<T, KelpError> {
        self.map_err(|e| KelpError::io(path, e))
    }
}

pub type Result<T> = std::result::Result<T, KelpError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ambiguous_message_lists_candidates() {
        let err = KelpError::AmbiguousPackage {
            query: "cli".to_string(),
            candidates: vec!["cli/cli".to_string(), "urfave/cli".to_string()],
        };
        assert_eq!(
            err.to_string(),
            "'cli' is ambiguous, use one of: cli/cli, urfave/cli"
        );
    }

    #[test]
    fn test_transient_classification() {
        let server = KelpError::Http {
            url: "u".into(),
            status: 502,
            body: String::new(),
        };
        let client = KelpError::Http {
            url: "u".into(),
            status: 404,
            body: String::new(),
        };
        assert!(server.is_transient());
        assert!(!client.is_transient());
        assert!(!KelpError::Config("x".into()).is_transient());
    }

    #[test]
    fn test_io_context_keeps_path() {
        let res: std::result::Result<(), io::Error> =
            Err(io::Error::new(io::ErrorKind::NotFound, "gone"));
        let err = res.at("/tmp/nowhere").unwrap_err();
        assert_eq!(err.to_string(), "/tmp/nowhere: gone");
    }
}
