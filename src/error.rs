pub type ChartAnimResult<T> = Result<T, ChartAnimError>;

#[derive(thiserror::Error, Debug)]
pub enum ChartAnimError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("scheduling error: {0}")]
    Scheduling(String),

    #[error("evaluation error: {0}")]
    Evaluation(String),

    #[error("encode error: {0}")]
    Encode(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ChartAnimError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn scheduling(msg: impl Into<String>) -> Self {
        Self::Scheduling(msg.into())
    }

    pub fn evaluation(msg: impl Into<String>) -> Self {
        Self::Evaluation(msg.into())
    }

    pub fn encode(msg: impl Into<String>) -> Self {
        Self::Encode(msg.into())
    }
}
