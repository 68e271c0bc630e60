pub type QuizResult<T> = Result<T, QuizError>;

#[derive(thiserror::Error, Debug)]
pub enum QuizError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("decode error: {0}")]
    Decode(String),

    #[error("render error: {0}")]
    Render(String),

    #[error("export error: {0}")]
    Export(String),

    #[error("cancelled: {0}")]
    Cancelled(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl QuizError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn decode(msg: impl Into<String>) -> Self {
        Self::Decode(msg.into())
    }

    pub fn render(msg: impl Into<String>) -> Self {
        Self::Render(msg.into())
    }

    pub fn export(msg: impl Into<String>) -> Self {
        Self::Export(msg.into())
    }

    pub fn cancelled(msg: impl Into<String>) -> Self {
        Self::Cancelled(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_prefixes_are_stable() {
        assert!(
            QuizError::validation("x")
                .to_string()
                .contains("validation error:")
        );
        assert!(QuizError::decode("x").to_string().contains("decode error:"));
        assert!(QuizError::render("x").to_string().contains("render error:"));
        assert!(QuizError::export("x").to_string().contains("export error:"));
        assert!(QuizError::cancelled("x").to_string().contains("cancelled:"));
    }

    #[test]
    fn other_preserves_source() {
        let base = std::io::Error::other("boom");
        let err = QuizError::Other(anyhow::Error::new(base));
        assert!(err.to_string().contains("boom"));
    }
}
