use crate::domain::value_object::PageError;

/// UseCaseError はユースケース層のエラーを型安全に表現する。
#[derive(Debug, thiserror::Error)]
pub enum UseCaseError {
    #[error("{0}")]
    NotFound(String),

    #[error("{message}")]
    Validation {
        message: String,
        details: Vec<String>,
    },

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    UnsupportedOperation(String),

    #[error("{0}")]
    Internal(#[from] anyhow::Error),
}

impl UseCaseError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
            details: Vec::new(),
        }
    }

    pub fn job_not_found(job_id: uuid::Uuid) -> Self {
        Self::NotFound(format!("import job not found: {job_id}"))
    }
}

impl From<PageError> for UseCaseError {
    fn from(e: PageError) -> Self {
        Self::validation(e.to_string())
    }
}

impl From<validator::ValidationErrors> for UseCaseError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut details: Vec<String> = errors
            .field_errors()
            .into_iter()
            .flat_map(|(field, errs)| {
                errs.iter().map(move |e| match &e.message {
                    Some(message) => format!("{field}: {message}"),
                    None => format!("{field}: {}", e.code),
                })
            })
            .collect();
        details.sort();
        Self::Validation {
            message: "entity data is invalid".to_string(),
            details,
        }
    }
}
