//! Per-platform image constraints
//!
//! Listing portals reject uploads that are too small, too large or in the wrong format,
//! often silently. Files are checked here before any upload is attempted.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::Cursor;

/// An image materialized in memory, ready to be handed to a file input
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageFile {
    pub name: String,
    /// MIME type, e.g. `image/jpeg`
    pub mime: String,
    pub bytes: Vec<u8>,
}

impl fmt::Debug for ImageFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImageFile")
            .field("name", &self.name)
            .field("mime", &self.mime)
            .field("len", &self.bytes.len())
            .finish()
    }
}

impl ImageFile {
    pub fn new(name: impl Into<String>, mime: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            mime: mime.into(),
            bytes,
        }
    }

    pub fn size(&self) -> usize {
        self.bytes.len()
    }

    /// Decode the whole image and return its width and height.
    /// A readable header over a damaged body is still an error.
    pub fn dimensions(&self) -> Result<(u32, u32), String> {
        let decoded = image::io::Reader::new(Cursor::new(&self.bytes))
            .with_guessed_format()
            .map_err(|e| e.to_string())?
            .decode()
            .map_err(|e| e.to_string())?;
        Ok(image::GenericImageView::dimensions(&decoded))
    }
}

/// Static upload constraints of one listing platform
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ImageRequirements {
    pub key: &'static str,
    pub min_count: usize,
    pub max_count: usize,
    /// Minimum width and height in pixels
    pub min_dimension: u32,
    pub max_file_size_bytes: usize,
    pub allowed_types: &'static [&'static str],
    pub notes: &'static str,
}

const MIB: usize = 1024 * 1024;

const DEFAULT_REQUIREMENTS: ImageRequirements = ImageRequirements {
    key: "default",
    min_count: 1,
    max_count: 50,
    min_dimension: 400,
    max_file_size_bytes: 10 * MIB,
    allowed_types: &["image/jpeg", "image/png", "image/webp", "image/gif"],
    notes: "Generic limits for portals without published requirements",
};

const PLATFORM_REQUIREMENTS: &[ImageRequirements] = &[
    ImageRequirements {
        key: "bayut",
        min_count: 10,
        max_count: 50,
        min_dimension: 800,
        max_file_size_bytes: 10 * MIB,
        allowed_types: &["image/jpeg", "image/png", "image/webp"],
        notes: "Listings with fewer than 10 photos are not accepted for quality score",
    },
    ImageRequirements {
        key: "dubizzle",
        min_count: 3,
        max_count: 30,
        min_dimension: 600,
        max_file_size_bytes: 8 * MIB,
        allowed_types: &["image/jpeg", "image/png"],
        notes: "First image becomes the cover photo",
    },
    ImageRequirements {
        key: "propertyfinder",
        min_count: 5,
        max_count: 50,
        min_dimension: 1000,
        max_file_size_bytes: 10 * MIB,
        allowed_types: &["image/jpeg", "image/png"],
        notes: "Landscape photos recommended",
    },
    ImageRequirements {
        key: "justproperty",
        min_count: 1,
        max_count: 40,
        min_dimension: 640,
        max_file_size_bytes: 5 * MIB,
        allowed_types: &["image/jpeg", "image/png"],
        notes: "",
    },
];

/// Requirements for `platform`, falling back to the generic defaults
pub fn requirements_for(platform: &str) -> &'static ImageRequirements {
    PLATFORM_REQUIREMENTS
        .iter()
        .find(|r| r.key.eq_ignore_ascii_case(platform))
        .unwrap_or(&DEFAULT_REQUIREMENTS)
}

/// Why a file or batch was rejected
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ValidationError {
    UnsupportedType { file: String, mime: String },
    TooLarge { file: String, size: usize, max: usize },
    TooSmall { file: String, width: u32, height: u32, min: u32 },
    Undecodable { file: String, reason: String },
    TooFew { count: usize, min: usize },
    TooMany { count: usize, max: usize },
}

impl ValidationError {
    /// Whether the error concerns a single file rather than the batch
    pub fn is_per_file(&self) -> bool {
        !matches!(self, ValidationError::TooFew { .. } | ValidationError::TooMany { .. })
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::UnsupportedType { file, mime } => {
                write!(f, "{}: type {} is not accepted", file, mime)
            }
            ValidationError::TooLarge { file, size, max } => {
                write!(f, "{}: {} bytes exceeds the {} byte limit", file, size, max)
            }
            ValidationError::TooSmall { file, width, height, min } => {
                write!(f, "{}: {}x{} is below the {}px minimum", file, width, height, min)
            }
            ValidationError::Undecodable { file, reason } => {
                write!(f, "{}: could not read image ({})", file, reason)
            }
            ValidationError::TooFew { count, min } => {
                write!(f, "{} valid images, at least {} required", count, min)
            }
            ValidationError::TooMany { count, max } => {
                write!(f, "{} images, at most {} allowed", count, max)
            }
        }
    }
}

/// Outcome of validating a batch
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationReport {
    pub valid: bool,
    pub errors: Vec<ValidationError>,
    pub valid_files: Vec<ImageFile>,
}

impl ValidationReport {
    pub fn per_file_errors(&self) -> impl Iterator<Item = &ValidationError> {
        self.errors.iter().filter(|e| e.is_per_file())
    }
}

fn check_file(file: &ImageFile, req: &ImageRequirements) -> Option<ValidationError> {
    let mime = file.mime.to_lowercase();
    if !req.allowed_types.contains(&mime.as_str()) {
        return Some(ValidationError::UnsupportedType {
            file: file.name.clone(),
            mime: file.mime.clone(),
        });
    }

    if file.size() > req.max_file_size_bytes {
        return Some(ValidationError::TooLarge {
            file: file.name.clone(),
            size: file.size(),
            max: req.max_file_size_bytes,
        });
    }

    match file.dimensions() {
        Ok((width, height)) if width < req.min_dimension || height < req.min_dimension => {
            Some(ValidationError::TooSmall {
                file: file.name.clone(),
                width,
                height,
                min: req.min_dimension,
            })
        }
        Ok(_) => None,
        Err(reason) => Some(ValidationError::Undecodable {
            file: file.name.clone(),
            reason,
        }),
    }
}

/// Validate `files` against the constraints of `platform`.
///
/// Per file: type, then size, then decoded dimensions; the first failing check rejects
/// the file. Count limits apply to the whole batch. The batch is valid only with zero
/// errors and at least the platform minimum of valid files.
pub fn validate(files: &[ImageFile], platform: &str) -> ValidationReport {
    let req = requirements_for(platform);
    let mut errors = Vec::new();
    let mut valid_files = Vec::new();

    for file in files {
        match check_file(file, req) {
            Some(error) => {
                log::debug!("Rejected image for {}: {}", req.key, error);
                errors.push(error);
            }
            None => valid_files.push(file.clone()),
        }
    }

    if files.len() > req.max_count {
        errors.push(ValidationError::TooMany {
            count: files.len(),
            max: req.max_count,
        });
    }
    if valid_files.len() < req.min_count {
        errors.push(ValidationError::TooFew {
            count: valid_files.len(),
            min: req.min_count,
        });
    }

    ValidationReport {
        valid: errors.is_empty() && valid_files.len() >= req.min_count,
        errors,
        valid_files,
    }
}

/// Encode a solid-colour JPEG of the given size
#[cfg(test)]
pub(crate) fn test_jpeg(name: &str, width: u32, height: u32) -> ImageFile {
    let img = image::RgbImage::from_pixel(width, height, image::Rgb([120, 140, 160]));
    let mut bytes = Vec::new();
    image::DynamicImage::ImageRgb8(img)
        .write_to(&mut Cursor::new(&mut bytes), image::ImageOutputFormat::Jpeg(80))
        .unwrap();
    ImageFile::new(name, "image/jpeg", bytes)
}
