//! Compression of retained archives.

use crate::error::{Error, Result};
use serde::Deserialize;
use std::ffi::OsString;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufReader, Write};
use std::path::{Path, PathBuf};

/// Codec used for compressed archives.
///
/// The codec fixes the suffix appended to an archive once it is compressed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Compression {
    /// gzip via `flate2`; archives end in `.gz`.
    #[default]
    Gzip,
    /// zstd; archives end in `.zst`.
    Zstd,
}

impl Compression {
    /// The suffix appended to a compressed archive's file name.
    pub fn suffix(self) -> &'static str {
        match self {
            Compression::Gzip => ".gz",
            Compression::Zstd => ".zst",
        }
    }

    fn encode(self, mut src: impl io::Read, dst: File) -> io::Result<File> {
        match self {
            Compression::Gzip => {
                let mut encoder = flate2::write::GzEncoder::new(dst, flate2::Compression::default());
                io::copy(&mut src, &mut encoder)?;
                encoder.finish()
            }
            Compression::Zstd => {
                let mut encoder = zstd::Encoder::new(dst, 3)?;
                io::copy(&mut src, &mut encoder)?;
                encoder.finish()
            }
        }
    }
}

/// Compress `path` into a sibling file with `codec`'s suffix and remove the
/// original.
///
/// The compressed file takes the source's permissions and replaces any
/// existing file of the same name. If encoding fails, the partial compressed
/// file is removed and the source is left untouched. Returns the path of the
/// compressed file.
///
/// # Errors
///
/// Returns [`Error::Compress`] if the source cannot be read, the destination
/// cannot be written, or the source cannot be removed afterwards.
pub fn compress_file(path: &Path, codec: Compression) -> Result<PathBuf> {
    let wrap = |source: io::Error| Error::Compress {
        path: path.to_path_buf(),
        source,
    };

    let src = File::open(path).map_err(wrap)?;
    let permissions = src.metadata().map_err(wrap)?.permissions();

    let dst_path = compressed_path(path, codec);
    let dst = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(&dst_path)
        .map_err(wrap)?;

    let encoded = dst
        .set_permissions(permissions)
        .and_then(|()| codec.encode(BufReader::new(src), dst))
        .and_then(|mut file| {
            file.flush()?;
            file.sync_data()
        });
    if let Err(e) = encoded {
        let _ = fs::remove_file(&dst_path);
        return Err(wrap(e));
    }

    fs::remove_file(path).map_err(wrap)?;
    Ok(dst_path)
}

fn compressed_path(path: &Path, codec: Compression) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(codec.suffix());
    PathBuf::from(name)
}
