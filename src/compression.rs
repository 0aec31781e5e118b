//! Compression Module
//!
//! Stream transforms applied to whole map files.
//!
//! The compression is chosen when a full file is written and is encoded in
//! the file name suffix, so a reader knows how to unwrap every file of a
//! chain without opening it first:
//!
//! ```text
//! Compression::None   orders-F3.perma        orders-F3-D1.perma
//! Compression::Zstd   orders-F3.perma.zst    orders-F3-D1.perma.zst
//! ```

use std::fmt;
use std::io::{self, Read, Write};

/// zstd level used for map files
const ZSTD_LEVEL: i32 = 3;

/// Compression strategy of a logical map's files
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Compression {
    /// Raw bytes
    #[default]
    None,

    /// zstd stream compression
    Zstd,
}

impl Compression {
    /// All known strategies, probed when scanning a directory
    pub const ALL: [Compression; 2] = [Compression::None, Compression::Zstd];

    /// File name suffix appended after `.perma`
    pub fn extension(&self) -> &'static str {
        match self {
            Compression::None => "",
            Compression::Zstd => ".zst",
        }
    }

    /// Resolve a strategy from a file name suffix ("" or ".zst")
    pub fn from_extension(ext: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.extension() == ext)
    }

    /// Wrap a raw reader with the decompression transform
    pub fn decompress<'a, R: Read + 'a>(&self, reader: R) -> io::Result<Box<dyn Read + 'a>> {
        match self {
            Compression::None => Ok(Box::new(reader)),
            Compression::Zstd => Ok(Box::new(zstd::Decoder::new(reader)?)),
        }
    }

    /// Wrap a raw writer with the compression transform
    ///
    /// The returned writer must be `finish`ed, otherwise the compressed
    /// stream is incomplete.
    pub fn compress<W: Write>(&self, writer: W) -> io::Result<CompressedWriter<W>> {
        match self {
            Compression::None => Ok(CompressedWriter::Plain(writer)),
            Compression::Zstd => Ok(CompressedWriter::Zstd(zstd::Encoder::new(
                writer, ZSTD_LEVEL,
            )?)),
        }
    }
}

impl fmt::Display for Compression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Compression::None => write!(f, "none"),
            Compression::Zstd => write!(f, "zstd"),
        }
    }
}

/// Writer produced by [`Compression::compress`]
pub enum CompressedWriter<W: Write> {
    Plain(W),
    Zstd(zstd::Encoder<'static, W>),
}

impl<W: Write> CompressedWriter<W> {
    /// Write the stream trailer (if any), flush, and return the inner writer
    pub fn finish(self) -> io::Result<W> {
        match self {
            CompressedWriter::Plain(mut w) => {
                w.flush()?;
                Ok(w)
            }
            CompressedWriter::Zstd(encoder) => {
                let mut w = encoder.finish()?;
                w.flush()?;
                Ok(w)
            }
        }
    }
}

impl<W: Write> Write for CompressedWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            CompressedWriter::Plain(w) => w.write(buf),
            CompressedWriter::Zstd(e) => e.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            CompressedWriter::Plain(w) => w.flush(),
            CompressedWriter::Zstd(e) => e.flush(),
        }
    }
}
