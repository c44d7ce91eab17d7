use thiserror::Error;

/// Reasons a render request is refused before any external tool runs.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Field 'latexCode' is required and must not be empty.")]
    MissingMarkup,
    #[error("Invalid format. Must be 'svg' or 'png'.")]
    InvalidFormat { value: String },
    #[error("Invalid tkz-tab syntax: Missing \\tkzTabVar.")]
    MissingVariationBody,
}

impl ValidationError {
    pub fn code(&self) -> &'static str {
        match self {
            ValidationError::MissingMarkup => "missing_markup",
            ValidationError::InvalidFormat { .. } => "invalid_format",
            ValidationError::MissingVariationBody => "missing_tkz_tab_var",
        }
    }
}
