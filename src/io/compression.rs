//! Transparent compression for pipeline inputs and outputs.
//!
//! Detection is extension-first (`.gz`, `.zst`, `.bz2`, `.xz`), falling back
//! to magic bytes for reads. Each codec sits behind its own feature flag;
//! with none enabled both helpers are buffered pass-throughs.
//!
//! Streams are `Send` because sources and sinks are moved into or borrowed
//! by pipeline worker threads. Output must be closed with
//! [`EncodedWriter::finish`].

use std::io::{self, BufRead, BufReader, BufWriter, Read, Write};
use std::path::Path;

pub type DynReader = Box<dyn Read + Send>;
pub type DynWriter = Box<dyn Write + Send>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Codec {
    Gzip,
    Zstd,
    Bzip2,
    Xz,
}

impl Codec {
    /// Codecs compiled into this build.
    #[must_use]
    pub fn enabled() -> &'static [Codec] {
        &[
            #[cfg(feature = "compression-gzip")]
            Codec::Gzip,
            #[cfg(feature = "compression-zstd")]
            Codec::Zstd,
            #[cfg(feature = "compression-bzip2")]
            Codec::Bzip2,
            #[cfg(feature = "compression-xz")]
            Codec::Xz,
        ]
    }

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Codec::Gzip => "gzip",
            Codec::Zstd => "zstd",
            Codec::Bzip2 => "bzip2",
            Codec::Xz => "xz",
        }
    }

    fn extensions(self) -> &'static [&'static str] {
        match self {
            Codec::Gzip => &[".gz", ".gzip"],
            Codec::Zstd => &[".zst", ".zstd"],
            Codec::Bzip2 => &[".bz2", ".bzip2"],
            Codec::Xz => &[".xz"],
        }
    }

    fn magic(self) -> &'static [u8] {
        match self {
            Codec::Gzip => &[0x1f, 0x8b],
            Codec::Zstd => &[0x28, 0xb5, 0x2f, 0xfd],
            Codec::Bzip2 => b"BZh",
            Codec::Xz => &[0xfd, 0x37, 0x7a, 0x58, 0x5a, 0x00],
        }
    }

    /// Codec implied by the file name, case-insensitively.
    #[must_use]
    pub fn from_path(path: &Path) -> Option<Codec> {
        let name = path.to_string_lossy().to_lowercase();
        Self::enabled()
            .iter()
            .copied()
            .find(|c| c.extensions().iter().any(|ext| name.ends_with(ext)))
    }

    fn from_magic(head: &[u8]) -> Option<Codec> {
        Self::enabled()
            .iter()
            .copied()
            .find(|c| head.starts_with(c.magic()))
    }

    #[allow(unused_variables)]
    fn wrap_reader(self, reader: DynReader) -> io::Result<DynReader> {
        match self {
            #[cfg(feature = "compression-gzip")]
            Codec::Gzip => Ok(Box::new(flate2::read::MultiGzDecoder::new(reader))),
            #[cfg(feature = "compression-zstd")]
            Codec::Zstd => Ok(Box::new(zstd::stream::read::Decoder::new(reader)?)),
            #[cfg(feature = "compression-bzip2")]
            Codec::Bzip2 => Ok(Box::new(bzip2::read::MultiBzDecoder::new(reader))),
            #[cfg(feature = "compression-xz")]
            Codec::Xz => Ok(Box::new(xz2::read::XzDecoder::new_multi_decoder(reader))),
            #[allow(unreachable_patterns)]
            other => Err(unsupported(other)),
        }
    }

    #[allow(unused_variables)]
    fn wrap_writer(self, writer: BufWriter<DynWriter>) -> io::Result<EncodedWriter> {
        match self {
            #[cfg(feature = "compression-gzip")]
            Codec::Gzip => Ok(EncodedWriter::Gzip(flate2::write::GzEncoder::new(
                writer,
                flate2::Compression::default(),
            ))),
            #[cfg(feature = "compression-zstd")]
            Codec::Zstd => Ok(EncodedWriter::Zstd(zstd::stream::write::Encoder::new(writer, 3)?)),
            #[cfg(feature = "compression-bzip2")]
            Codec::Bzip2 => Ok(EncodedWriter::Bzip2(bzip2::write::BzEncoder::new(
                writer,
                bzip2::Compression::default(),
            ))),
            #[cfg(feature = "compression-xz")]
            Codec::Xz => Ok(EncodedWriter::Xz(xz2::write::XzEncoder::new(writer, 6))),
            #[allow(unreachable_patterns)]
            other => Err(unsupported(other)),
        }
    }
}

/// Output stream, optionally compressed.
///
/// Call [`EncodedWriter::finish`] to close it: the codec trailer is written
/// and every buffered byte reaches the destination, with failures reported.
/// Dropping an unfinished writer gives no such guarantee.
pub enum EncodedWriter {
    Plain(BufWriter<DynWriter>),
    #[cfg(feature = "compression-gzip")]
    Gzip(flate2::write::GzEncoder<BufWriter<DynWriter>>),
    #[cfg(feature = "compression-zstd")]
    Zstd(zstd::stream::write::Encoder<'static, BufWriter<DynWriter>>),
    #[cfg(feature = "compression-bzip2")]
    Bzip2(bzip2::write::BzEncoder<BufWriter<DynWriter>>),
    #[cfg(feature = "compression-xz")]
    Xz(xz2::write::XzEncoder<BufWriter<DynWriter>>),
}

impl EncodedWriter {
    /// Write the codec trailer, then flush everything down to the destination.
    ///
    /// # Errors
    /// Any error from the encoder, the buffer or the destination.
    pub fn finish(self) -> io::Result<()> {
        let buffered = match self {
            EncodedWriter::Plain(w) => w,
            #[cfg(feature = "compression-gzip")]
            EncodedWriter::Gzip(enc) => enc.finish()?,
            #[cfg(feature = "compression-zstd")]
            EncodedWriter::Zstd(enc) => enc.finish()?,
            #[cfg(feature = "compression-bzip2")]
            EncodedWriter::Bzip2(enc) => enc.finish()?,
            #[cfg(feature = "compression-xz")]
            EncodedWriter::Xz(enc) => enc.finish()?,
        };
        let mut inner = buffered.into_inner().map_err(io::IntoInnerError::into_error)?;
        inner.flush()
    }

    fn get_mut(&mut self) -> &mut dyn Write {
        match self {
            EncodedWriter::Plain(w) => w,
            #[cfg(feature = "compression-gzip")]
            EncodedWriter::Gzip(enc) => enc,
            #[cfg(feature = "compression-zstd")]
            EncodedWriter::Zstd(enc) => enc,
            #[cfg(feature = "compression-bzip2")]
            EncodedWriter::Bzip2(enc) => enc,
            #[cfg(feature = "compression-xz")]
            EncodedWriter::Xz(enc) => enc,
        }
    }
}

impl Write for EncodedWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.get_mut().write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.get_mut().flush()
    }
}

#[allow(dead_code)]
fn unsupported(codec: Codec) -> io::Error {
    io::Error::new(
        io::ErrorKind::Unsupported,
        format!("{} support not compiled in", codec.name()),
    )
}

/// Wrap `reader` with decompression if `path_hint` or the stream head calls for it.
///
/// # Errors
/// Fails if the stream head cannot be read or the decoder cannot start.
pub fn auto_detect_reader<R: Read + Send + 'static>(
    reader: R,
    path_hint: impl AsRef<Path>,
) -> io::Result<DynReader> {
    if let Some(codec) = Codec::from_path(path_hint.as_ref()) {
        return codec.wrap_reader(Box::new(BufReader::new(reader)));
    }
    let mut buffered = BufReader::new(reader);
    let detected = Codec::from_magic(buffered.fill_buf()?);
    match detected {
        Some(codec) => codec.wrap_reader(Box::new(buffered)),
        None => Ok(Box::new(buffered)),
    }
}

/// Wrap `writer` with compression when the extension of `path_hint` names a codec.
///
/// # Errors
/// Fails if the encoder cannot start.
pub fn auto_detect_writer<W: Write + Send + 'static>(
    writer: W,
    path_hint: impl AsRef<Path>,
) -> io::Result<EncodedWriter> {
    let buffered = BufWriter::new(Box::new(writer) as DynWriter);
    match Codec::from_path(path_hint.as_ref()) {
        Some(codec) => codec.wrap_writer(buffered),
        None => Ok(EncodedWriter::Plain(buffered)),
    }
}
