//! LS-8 program image format.
//!
//! A program image is plain text:
//! - One byte per line, written as up to eight binary digits
//! - Anything after `#` on a line is a comment
//! - Blank and comment-only lines are ignored
//!
//! Bytes are loaded from address 0 in file order, without gaps.

use crate::asm::disasm::listing;
use std::path::Path;
use std::io::{BufWriter, Write};
use thiserror::Error;

/// A loaded program image.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProgramImage {
    /// The program bytes, address 0 first.
    pub bytes: Vec<u8>,
    /// Source text of the line each byte came from.
    pub source_lines: Vec<String>,
}

impl ProgramImage {
    /// Create a new empty image.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build an image from raw bytes.
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        let source_lines = bytes.iter().map(|b| format!("{:08b}", b)).collect();
        Self { bytes, source_lines }
    }

    /// Add a byte.
    pub fn push(&mut self, byte: u8, source: &str) {
        self.bytes.push(byte);
        self.source_lines.push(source.to_string());
    }

    /// Get the number of bytes.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Check if empty.
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Parse program image text.
pub fn parse_image(text: &str) -> Result<ProgramImage, ImageError> {
    let mut image = ProgramImage::new();

    for (line_num, line) in text.lines().enumerate() {
        let code = line.split('#').next().unwrap_or("").trim();

        // Skip empty lines and comments
        if code.is_empty() {
            continue;
        }

        if !code.chars().all(|c| c == '0' || c == '1') {
            return Err(ImageError::ParseError {
                line: line_num + 1,
                message: format!("expected binary digits, found {:?}", code),
            });
        }

        let byte = u8::from_str_radix(code, 2).map_err(|_| ImageError::ParseError {
            line: line_num + 1,
            message: format!("{:?} does not fit in 8 bits", code),
        })?;

        image.push(byte, line.trim());
    }

    Ok(image)
}

/// Load a program image from disk.
pub fn load_image<P: AsRef<Path>>(path: P) -> Result<ProgramImage, ImageError> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path)
        .map_err(|e| ImageError::IoError(format!("{}: {}", path.display(), e)))?;

    let image = parse_image(&text)?;
    tracing::debug!(path = %path.display(), bytes = image.len(), "image loaded");
    Ok(image)
}

/// Save a program image to disk, annotating each instruction.
pub fn save_image<P: AsRef<Path>>(path: P, image: &ProgramImage) -> Result<(), ImageError> {
    let file = std::fs::File::create(path.as_ref())
        .map_err(|e| ImageError::IoError(e.to_string()))?;
    let mut out = BufWriter::new(file);

    write_image(&mut out, &image.bytes).map_err(|e| ImageError::IoError(e.to_string()))
}

/// Render `bytes` in image format to `out`.
pub fn write_image<W: Write>(out: &mut W, bytes: &[u8]) -> std::io::Result<()> {
    writeln!(out, "# LS-8 program image")?;
    writeln!(out, "# {} bytes", bytes.len())?;
    writeln!(out)?;

    for (addr, width, text) in listing(bytes) {
        // Format: 00000000 # addr: instruction, operands on the following lines
        writeln!(out, "{:08b} # {:03}: {}", bytes[addr], addr, text)?;
        for byte in &bytes[addr + 1..addr + width] {
            writeln!(out, "{:08b}", byte)?;
        }
    }

    out.flush()
}

/// Errors that can occur during image operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ImageError {
    #[error("I/O error: {0}")]
    IoError(String),

    #[error("parse error on line {line}: {message}")]
    ParseError { line: usize, message: String },
}
