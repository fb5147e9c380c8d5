//! Confirmation gate for destructive steps.

/// How strong a confirmation must be.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfirmTier {
    /// The operator types `yes`.
    Proceed,
    /// The operator types `destroy <target>`; used when data is deleted.
    Destroy,
}

impl ConfirmTier {
    /// Phrase the operator must type for `target`.
    ///
    /// # Examples
    ///
    /// ```
    /// use smb_zfs::operations::ConfirmTier;
    ///
    /// assert_eq!(ConfirmTier::Proceed.phrase("alice"), "yes");
    /// assert_eq!(ConfirmTier::Destroy.phrase("alice"), "destroy alice");
    /// ```
    #[must_use]
    pub fn phrase(self, target: &str) -> String {
        match self {
            Self::Proceed => "yes".to_string(),
            Self::Destroy => format!("destroy {target}"),
        }
    }
}

/// Source of confirmation answers.
///
/// Implementations return whatever the operator answered, or `None` when no
/// answer could be obtained.  The caller compares the answer with `phrase`.
#[cfg_attr(test, mockall::automock)]
pub trait Confirm {
    /// Show `message`, tell the operator to type `phrase`, return the answer.
    fn confirm(&self, message: &str, phrase: &str) -> Option<String>;
}

/// Answers every prompt with the expected phrase (`--yes`).
#[derive(Debug, Clone, Copy, Default)]
pub struct AssumeYes;

impl Confirm for AssumeYes {
    fn confirm(&self, _message: &str, phrase: &str) -> Option<String> {
        Some(phrase.to_string())
    }
}
