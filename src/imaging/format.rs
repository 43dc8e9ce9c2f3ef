//! Output formats the encoder can produce.
//!
//! Formats are named the way users name them: by mime type (`image/jpeg`),
//! by mime subtype (`jpeg`) or by common extension (`jpg`). The file
//! extension of an export is always the mime subtype, so a JPEG export is
//! `compressed.jpeg`.

use super::params::ParamError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum OutputFormat {
    Jpeg,
    Png,
    WebP,
    Avif,
}

impl OutputFormat {
    pub fn mime_type(self) -> &'static str {
        match self {
            Self::Jpeg => "image/jpeg",
            Self::Png => "image/png",
            Self::WebP => "image/webp",
            Self::Avif => "image/avif",
        }
    }

    /// File extension, derived from the mime subtype.
    pub fn extension(self) -> &'static str {
        let mime = self.mime_type();
        &mime[mime.find('/').map_or(0, |i| i + 1)..]
    }

    /// Whether the encoder honours a quality setting.
    ///
    /// WebP is encoded losslessly by the pure-Rust encoder, so quality is
    /// ignored there.
    pub fn is_lossy(self) -> bool {
        matches!(self, Self::Jpeg | Self::Avif)
    }
}

impl FromStr for OutputFormat {
    type Err = ParamError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase();
        let name = lower.strip_prefix("image/").unwrap_or(&lower);
        match name {
            "jpeg" | "jpg" => Ok(Self::Jpeg),
            "png" => Ok(Self::Png),
            "webp" => Ok(Self::WebP),
            "avif" => Ok(Self::Avif),
            _ => Err(ParamError::UnknownFormat(s.to_string())),
        }
    }
}

impl TryFrom<String> for OutputFormat {
    type Error = ParamError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<OutputFormat> for String {
    fn from(format: OutputFormat) -> Self {
        format.extension().to_string()
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extension_is_mime_subtype() {
        assert_eq!(OutputFormat::Jpeg.extension(), "jpeg");
        assert_eq!(OutputFormat::Png.extension(), "png");
        assert_eq!(OutputFormat::WebP.extension(), "webp");
        assert_eq!(OutputFormat::Avif.extension(), "avif");
    }

    #[test]
    fn parse_mime_subtype_and_alias() {
        assert_eq!("image/jpeg".parse(), Ok(OutputFormat::Jpeg));
        assert_eq!("JPG".parse(), Ok(OutputFormat::Jpeg));
        assert_eq!("webp".parse(), Ok(OutputFormat::WebP));
        assert_eq!("image/AVIF".parse(), Ok(OutputFormat::Avif));
    }

    #[test]
    fn reject_unknown_format() {
        assert!("image/gif".parse::<OutputFormat>().is_err());
        assert!("".parse::<OutputFormat>().is_err());
    }

    #[test]
    fn lossy_formats() {
        assert!(OutputFormat::Jpeg.is_lossy());
        assert!(OutputFormat::Avif.is_lossy());
        assert!(!OutputFormat::Png.is_lossy());
        assert!(!OutputFormat::WebP.is_lossy());
    }

    #[test]
    fn serde_uses_extension_strings() {
        let json = serde_json::to_string(&OutputFormat::Png).unwrap();
        assert_eq!(json, "\"png\"");
        let parsed: OutputFormat = serde_json::from_str("\"image/jpeg\"").unwrap();
        assert_eq!(parsed, OutputFormat::Jpeg);
    }
}
