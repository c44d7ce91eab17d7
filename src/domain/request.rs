use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use super::error::ValidationError;

/// Image formats the pipeline can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Svg,
    Png,
}

impl OutputFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            OutputFormat::Svg => "svg",
            OutputFormat::Png => "png",
        }
    }

    pub fn mimetype(self) -> &'static str {
        match self {
            OutputFormat::Svg => "image/svg+xml",
            OutputFormat::Png => "image/png",
        }
    }

    /// Vector output is returned as text; raster output as bytes.
    pub fn is_vector(self) -> bool {
        matches!(self, OutputFormat::Svg)
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OutputFormat {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "svg" => Ok(OutputFormat::Svg),
            "png" => Ok(OutputFormat::Png),
            other => Err(ValidationError::InvalidFormat {
                value: other.to_string(),
            }),
        }
    }
}

/// The `format` field as it arrived, keeping an explicit `null` apart from an omitted field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestedFormat<'a> {
    Omitted,
    Null,
    Named(&'a str),
}

impl RequestedFormat<'_> {
    /// An omitted field means SVG; `null` and unknown names are rejected.
    pub fn resolve(self) -> Result<OutputFormat, ValidationError> {
        match self {
            RequestedFormat::Omitted => Ok(OutputFormat::default()),
            RequestedFormat::Null => Err(ValidationError::InvalidFormat {
                value: "null".to_string(),
            }),
            RequestedFormat::Named(value) => value.parse(),
        }
    }
}

/// A validated render request: non-empty trimmed markup plus a recognised format.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderRequest {
    markup: String,
    format: OutputFormat,
}

impl RenderRequest {
    pub fn new(markup: &str, format: OutputFormat) -> Result<Self, ValidationError> {
        let trimmed = markup.trim();
        if trimmed.is_empty() {
            return Err(ValidationError::MissingMarkup);
        }
        Ok(Self {
            markup: trimmed.to_string(),
            format,
        })
    }

    /// Validate raw wire values. Markup is checked before the format.
    pub fn parse(
        markup: Option<&str>,
        format: RequestedFormat<'_>,
    ) -> Result<Self, ValidationError> {
        let markup = markup.ok_or(ValidationError::MissingMarkup)?;
        if markup.trim().is_empty() {
            return Err(ValidationError::MissingMarkup);
        }
        Self::new(markup, format.resolve()?)
    }

    pub fn markup(&self) -> &str {
        &self.markup
    }

    pub fn format(&self) -> OutputFormat {
        self.format
    }
}
