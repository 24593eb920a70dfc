use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum PipelineError {
    /// No tier produced any text (§4.2, §7).
    #[error("transcription failed: {0}")]
    Transcription(String),
}

impl From<medirx_core::Error> for PipelineError {
    fn from(err: medirx_core::Error) -> Self {
        PipelineError::Transcription(err.to_string())
    }
}

impl From<PipelineError> for medirx_core::Error {
    fn from(err: PipelineError) -> Self {
        match err {
            PipelineError::Transcription(msg) => medirx_core::Error::Transcription(msg),
        }
    }
}
