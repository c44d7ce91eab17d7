use serde::{Deserialize, Deserializer, Serialize};

use crate::domain::request::RequestedFormat;

/// JSON body accepted by `POST /render`.
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct RenderBody {
    #[serde(rename = "latexCode", default)]
    pub latex_code: Option<String>,
    /// Outer `None`: field omitted. `Some(None)`: explicit `null`.
    #[serde(
        default,
        deserialize_with = "present_or_null",
        skip_serializing_if = "Option::is_none"
    )]
    pub format: Option<Option<String>>,
}

impl RenderBody {
    pub fn requested_format(&self) -> RequestedFormat<'_> {
        match &self.format {
            None => RequestedFormat::Omitted,
            Some(None) => RequestedFormat::Null,
            Some(Some(value)) => RequestedFormat::Named(value),
        }
    }
}

fn present_or_null<'de, D>(deserializer: D) -> Result<Option<Option<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<String>::deserialize(deserializer).map(Some)
}
