use serde::Serialize;
use std::future::Future;

/// Result of one independent read within a fetch cycle
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "lowercase")]
pub enum FetchOutcome<T> {
    Success { value: T },
    Failure { reason: String },
}

impl<T> FetchOutcome<T> {
    pub fn success(value: T) -> Self {
        FetchOutcome::Success { value }
    }

    pub fn failure(reason: impl Into<String>) -> Self {
        FetchOutcome::Failure {
            reason: reason.into(),
        }
    }
}

impl<T, E: std::fmt::Display> From<Result<T, E>> for FetchOutcome<T> {
    fn from(result: Result<T, E>) -> Self {
        match result {
            Ok(value) => FetchOutcome::success(value),
            Err(e) => FetchOutcome::failure(e.to_string()),
        }
    }
}

/// Await a fallible read and convert its error at the boundary, so one
/// failing read can never short-circuit its siblings.
pub async fn settle<T, E, F>(read: F) -> FetchOutcome<T>
where
    F: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    read.await.into()
}
