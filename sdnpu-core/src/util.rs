use std::io::Cursor;

use base64::{prelude::BASE64_STANDARD, Engine};
use image::DynamicImage;

use crate::EncodeError;

pub fn image_to_png(img: &DynamicImage) -> Result<Vec<u8>, EncodeError> {
    let mut bytes = Vec::new();
    img.write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)?;
    Ok(bytes)
}

/// Encodes an image as PNG and wraps the bytes in standard base64 for JSON transport.
pub fn image_to_base64_png(img: &DynamicImage) -> Result<String, EncodeError> {
    Ok(BASE64_STANDARD.encode(image_to_png(img)?))
}
