use thiserror::Error;

/// Unexpected failures. Policy rejections are not errors; they come back as
/// `JoinOutcome::Rejected` / `LeaveOutcome::Rejected`.
#[derive(Debug, Error)]
pub enum RegistrationError {
    /// The transaction failed and was rolled back.
    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}
