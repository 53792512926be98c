//! Error types shared across the hosting-capacity workspace.
//!
//! Most runtime conditions here are deliberately non-fatal (duplicate
//! reactors, unrecognized node indices, non-convergence) and are reported
//! through [`crate::Diagnostics`] instead. [`HcaError`] covers the
//! genuinely exceptional cases and travels inside `anyhow::Error`, so
//! callers that care about the category can downcast to it.

use thiserror::Error;

/// Structured failure categories of the workspace.
#[derive(Error, Debug)]
pub enum HcaError {
    /// Malformed terminal address or node index
    #[error("Address error: {0}")]
    Address(String),

    /// The solver rejected a command or query
    #[error("Engine error: {0}")]
    Engine(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_names_the_category() {
        let err = HcaError::Engine("solve rejected".into());
        assert!(err.to_string().contains("Engine error"));
        assert!(err.to_string().contains("solve rejected"));
    }

    #[test]
    fn downcasts_out_of_an_anyhow_chain() {
        let err: anyhow::Error = HcaError::Address("trailing junk".into()).into();
        assert!(matches!(
            err.downcast_ref::<HcaError>(),
            Some(HcaError::Address(_))
        ));
    }
}
