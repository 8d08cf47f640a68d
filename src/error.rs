//! Error taxonomy for pipeline runs.
//!
//! Every variant is fatal for the run that raised it. Nothing here is retried:
//! a frame that cannot be scored aborts the run so that `frame_number` stays
//! gapless in the output.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, PipelineError>;

#[derive(Error, Debug)]
pub enum PipelineError {
    /// Model artifact, input stream or configuration value is unusable.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Video sink (or result sink) could not be created or written.
    #[error("stream i/o error: {0}")]
    StreamIo(String),

    /// The detection or tracking oracle failed while scoring a frame.
    #[error("oracle failed on frame {frame}: {source:#}")]
    OracleInvocation {
        frame: u64,
        #[source]
        source: anyhow::Error,
    },

    /// Statistics do not match the fold of their frame records.
    #[error("schema violation: {0}")]
    Schema(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl PipelineError {
    pub fn configuration<S: Into<String>>(msg: S) -> Self {
        Self::Configuration(msg.into())
    }

    pub fn stream_io<S: Into<String>>(msg: S) -> Self {
        Self::StreamIo(msg.into())
    }

    pub fn schema<S: Into<String>>(msg: S) -> Self {
        Self::Schema(msg.into())
    }

    pub fn oracle(frame: u64, source: anyhow::Error) -> Self {
        Self::OracleInvocation { frame, source }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn oracle_error_reports_frame_and_cause() {
        let err = PipelineError::oracle(12, anyhow::anyhow!("tensor shape mismatch"));
        let msg = err.to_string();
        assert!(msg.contains("frame 12"), "{msg}");
        assert!(msg.contains("tensor shape mismatch"), "{msg}");
    }

    #[test]
    fn io_errors_convert() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: PipelineError = io.into();
        assert!(matches!(err, PipelineError::Io(_)));
    }
}
