//! Decoding uploads into bitmaps.
//!
//! An [`Upload`] is what the user hands over: a name, the type the picker
//! declared for it, and the raw bytes. Only uploads that declare an
//! `image/*` type are decoded; everything else is ignored before any bytes
//! are touched, the same way a file picker filtered to images behaves.

use super::backend::ImagingError;
use image::{DynamicImage, ImageFormat, RgbaImage};
use std::path::Path;
use std::sync::LazyLock;
use tracing::debug;

/// Extensions whose decoders are compiled in.
const DECODE_CANDIDATES: &[(&str, ImageFormat)] = &[
    ("jpg", ImageFormat::Jpeg),
    ("jpeg", ImageFormat::Jpeg),
    ("png", ImageFormat::Png),
    ("tif", ImageFormat::Tiff),
    ("tiff", ImageFormat::Tiff),
    ("webp", ImageFormat::WebP),
];

static SUPPORTED_EXTENSIONS: LazyLock<Vec<&'static str>> = LazyLock::new(|| {
    DECODE_CANDIDATES
        .iter()
        .filter(|(_, fmt)| fmt.reading_enabled())
        .map(|(ext, _)| *ext)
        .collect()
});

/// Returns the set of image file extensions that have working decoders compiled in.
pub fn supported_input_extensions() -> &'static [&'static str] {
    &SUPPORTED_EXTENSIONS
}

/// Whether `path` has an extension we can decode.
pub fn is_supported_input(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| {
            supported_input_extensions()
                .iter()
                .any(|s| s.eq_ignore_ascii_case(e))
        })
}

/// A file handed to a tool.
#[derive(Debug, Clone)]
pub struct Upload {
    pub name: String,
    /// Declared mime type, e.g. `image/png`. `None` when unknown.
    pub declared_type: Option<String>,
    pub bytes: Vec<u8>,
}

impl Upload {
    pub fn new(name: impl Into<String>, declared_type: Option<&str>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            declared_type: declared_type.map(str::to_string),
            bytes,
        }
    }

    /// Read a file from disk, declaring its type from the extension.
    pub fn from_path(path: &Path) -> Result<Self, ImagingError> {
        let bytes = std::fs::read(path)?;
        let declared_type = ImageFormat::from_path(path)
            .ok()
            .map(|f| f.to_mime_type().to_string());
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(Self {
            name,
            declared_type,
            bytes,
        })
    }

    /// Whether the declared type says this is an image.
    pub fn is_image(&self) -> bool {
        self.declared_type
            .as_deref()
            .is_some_and(|t| t.starts_with("image/"))
    }
}

/// A decoded image at its natural size.
///
/// Immutable after decoding. Pixels are reachable only through the draw
/// operations of [`RenderSurface`](super::RenderSurface).
#[derive(Debug, Clone)]
pub struct Bitmap {
    pixels: RgbaImage,
}

impl Bitmap {
    /// Decode encoded image bytes, sniffing the format from the content.
    pub fn decode(bytes: &[u8]) -> Result<Self, ImagingError> {
        let format = image::guess_format(bytes).ok();
        let img = image::load_from_memory(bytes)
            .map_err(|e| ImagingError::Decode(e.to_string()))?;
        debug!(
            width = img.width(),
            height = img.height(),
            format = ?format,
            "decoded bitmap"
        );
        Ok(Self {
            pixels: img.into_rgba8(),
        })
    }

    /// Decode an upload. Returns `Ok(None)` when the upload does not declare
    /// an image type.
    pub fn from_upload(upload: &Upload) -> Result<Option<Self>, ImagingError> {
        if !upload.is_image() {
            debug!(name = %upload.name, declared = ?upload.declared_type, "ignoring non-image upload");
            return Ok(None);
        }
        Self::decode(&upload.bytes).map(Some)
    }

    /// Wrap already-decoded pixels.
    pub fn from_pixels(img: DynamicImage) -> Self {
        Self {
            pixels: img.into_rgba8(),
        }
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.pixels.dimensions()
    }

    pub(crate) fn pixels(&self) -> &RgbaImage {
        &self.pixels
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use image::{ImageEncoder, Rgba};

    /// Gradient test image; varied content keeps lossy encoders honest.
    pub fn gradient(width: u32, height: u32) -> Bitmap {
        let img = RgbaImage::from_fn(width, height, |x, y| {
            Rgba([(x % 256) as u8, (y % 256) as u8, ((x + y) % 256) as u8, 255])
        });
        Bitmap::from_pixels(DynamicImage::ImageRgba8(img))
    }

    pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let img = gradient(width, height);
        let mut out = Vec::new();
        image::codecs::png::PngEncoder::new(&mut out)
            .write_image(
                img.pixels().as_raw(),
                width,
                height,
                image::ExtendedColorType::Rgba8,
            )
            .unwrap();
        out
    }

    #[test]
    fn supported_extensions_match_decodable_formats() {
        let exts = supported_input_extensions();
        for expected in &["jpg", "jpeg", "png", "tif", "tiff", "webp"] {
            assert!(exts.contains(expected), "expected {expected}");
        }
    }

    #[test]
    fn is_supported_input_ignores_case() {
        assert!(is_supported_input(Path::new("/a/b/photo.JPG")));
        assert!(!is_supported_input(Path::new("/a/b/notes.txt")));
        assert!(!is_supported_input(Path::new("/a/b/noext")));
    }

    #[test]
    fn decode_png_keeps_natural_dimensions() {
        let bitmap = Bitmap::decode(&png_bytes(64, 48)).unwrap();
        assert_eq!(bitmap.dimensions(), (64, 48));
    }

    #[test]
    fn decode_garbage_is_decode_error() {
        let err = Bitmap::decode(b"definitely not an image").unwrap_err();
        assert!(matches!(err, ImagingError::Decode(_)));
    }

    #[test]
    fn non_image_upload_is_ignored() {
        let upload = Upload::new("notes.txt", Some("text/plain"), b"hello".to_vec());
        assert!(Bitmap::from_upload(&upload).unwrap().is_none());

        let untyped = Upload::new("blob", None, png_bytes(4, 4));
        assert!(Bitmap::from_upload(&untyped).unwrap().is_none());
    }

    #[test]
    fn image_upload_is_decoded() {
        let upload = Upload::new("pic.png", Some("image/png"), png_bytes(8, 6));
        let bitmap = Bitmap::from_upload(&upload).unwrap().unwrap();
        assert_eq!(bitmap.dimensions(), (8, 6));
    }

    #[test]
    fn upload_from_path_declares_type_from_extension() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("holiday.png");
        std::fs::write(&path, png_bytes(3, 3)).unwrap();

        let upload = Upload::from_path(&path).unwrap();
        assert_eq!(upload.name, "holiday.png");
        assert_eq!(upload.declared_type.as_deref(), Some("image/png"));
        assert!(upload.is_image());
    }

    #[test]
    fn upload_from_missing_path_is_io_error() {
        let err = Upload::from_path(Path::new("/nonexistent/photo.png")).unwrap_err();
        assert!(matches!(err, ImagingError::Io(_)));
    }
}
