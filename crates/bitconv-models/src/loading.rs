//! Input image text format.
//!
//! ```text
//! height width channels
//! R G B  R G B  R G B  ...   (row 0)
//! R G B  R G B  R G B  ...   (row 1)
//! ```
//!
//! Tokens are whitespace-separated; line breaks carry no meaning beyond
//! separating tokens. Every sample must parse as `u8`; a bad or missing
//! sample fails the whole load.

use crate::error::{ModelError, Result};
use crate::tensor::{Image, Shape};
use std::path::Path;
use tracing::{info, warn};

/// Load an image from a text file.
///
/// # Errors
///
/// Returns [`ModelError::FileNotFound`] if the path does not exist, and any
/// error from [`parse_image`].
pub fn load_image(path: impl AsRef<Path>) -> Result<Image> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(ModelError::file_not_found(path));
    }
    let text = std::fs::read_to_string(path)?;
    let image = parse_image(&text)?;
    info!("Loaded {} image from {}", image.shape(), path.display());
    Ok(image)
}

/// Parse an image from its text form.
///
/// # Errors
///
/// - [`ModelError::ParseError`] for a missing, non-numeric or zero dimension,
///   or dimensions whose product overflows
/// - [`ModelError::InvalidSample`] for a sample that is not `0..=255`
/// - [`ModelError::Truncated`] if the data ends early
pub fn parse_image(text: &str) -> Result<Image> {
    let mut tokens = text.split_whitespace();

    let mut dim = |name: &str| -> Result<usize> {
        let token = tokens
            .next()
            .ok_or_else(|| ModelError::parse_error(format!("missing {name} in header")))?;
        let value: usize = token
            .parse()
            .map_err(|_| ModelError::parse_error(format!("{name} {token:?} is not an integer")))?;
        if value == 0 {
            return Err(ModelError::parse_error(format!("{name} must be non-zero")));
        }
        Ok(value)
    };
    let shape = Shape::new(dim("height")?, dim("width")?, dim("channels")?);
    let expected = shape
        .checked_len()
        .ok_or_else(|| ModelError::parse_error(format!("image size {shape} overflows")))?;

    // Every sample needs at least one digit and one separator
    let mut data = Vec::with_capacity(expected.min(text.len() / 2 + 1));
    for row in 0..shape.height {
        for col in 0..shape.width {
            for channel in 0..shape.channels {
                let Some(token) = tokens.next() else {
                    return Err(ModelError::Truncated {
                        expected,
                        found: data.len(),
                    });
                };
                let sample = token.parse::<u8>().map_err(|_| ModelError::InvalidSample {
                    row,
                    col,
                    channel,
                    token: token.to_string(),
                })?;
                data.push(sample);
            }
        }
    }

    let extra = tokens.count();
    if extra > 0 {
        warn!("Ignoring {extra} trailing tokens after {shape} image data");
    }

    Image::new(shape, data)
}
