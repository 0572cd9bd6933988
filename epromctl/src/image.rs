//! Text image files.
//!
//! The format holds one byte per line in address order, after a fixed
//! header line:
//!
//! ```text
//! v2.0 raw
//! 0x3c
//! 0x0
//! 0xff
//! ```
//!
//! Data lines are hex, with or without a `0x` prefix. Lines that are not
//! plain hex (the header included) are ignored when loading.

use std::fmt::Write as _;
use std::fs;
use std::path::Path;

use log::debug;

use crate::error::{Error, Result};

/// First line of every file written by [`save`].
pub const HEADER: &str = "v2.0 raw";

/// Hex digits of a data line, or `None` if the line carries no data.
fn data_digits(line: &str) -> Option<&str> {
    let line = line.trim_end();
    let digits = line.strip_prefix("0x").unwrap_or(line);
    if !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_hexdigit()) {
        Some(digits)
    } else {
        None
    }
}

/// Parse the hex digits of one data line into a byte.
fn byte_value(digits: &str) -> Option<u8> {
    let significant = digits.trim_start_matches('0');
    if significant.len() > 2 {
        return None;
    }
    if significant.is_empty() {
        return Some(0);
    }
    u8::from_str_radix(significant, 16).ok()
}

/// Parse image text, accepting at most `max_size` bytes.
pub fn parse(text: &str, max_size: usize) -> Result<Vec<u8>> {
    let mut image = Vec::new();

    for (index, line) in text.lines().enumerate() {
        let Some(digits) = data_digits(line) else {
            continue;
        };

        if image.len() == max_size {
            return Err(Error::Validation(
                "The data in the file is greater than the EPROM size".into(),
            ));
        }

        let value = byte_value(digits).ok_or_else(|| {
            Error::Validation(format!(
                "The data value must be between 0x0 and 0xff (0 to 255 decimal), found {} on line {}",
                line.trim_end(),
                index + 1
            ))
        })?;
        image.push(value);
    }

    if image.is_empty() {
        return Err(Error::Validation("The input file contains no data".into()));
    }

    Ok(image)
}

/// Load an image file, accepting at most `max_size` bytes.
pub fn load<P: AsRef<Path>>(path: P, max_size: usize) -> Result<Vec<u8>> {
    let path = path.as_ref();
    let text = fs::read_to_string(path)?;
    let image = parse(&text, max_size)?;
    debug!("Loaded {} bytes from {}", image.len(), path.display());
    Ok(image)
}

/// Render an image in the file format.
pub fn render(image: &[u8]) -> String {
    let mut text = String::with_capacity(HEADER.len() + 1 + image.len() * 5);
    text.push_str(HEADER);
    text.push('\n');
    for byte in image {
        // Writing to a String cannot fail
        let _ = writeln!(text, "{byte:#x}");
    }
    text
}

/// Write an image file.
pub fn save<P: AsRef<Path>>(path: P, image: &[u8]) -> Result<()> {
    let path = path.as_ref();
    fs::write(path, render(image))?;
    debug!("Saved {} bytes to {}", image.len(), path.display());
    Ok(())
}
