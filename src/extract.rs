//! Unpacks downloaded artifacts into a scratch directory.

use crate::asset::extension;
use crate::error::{IoContext, KelpError, Result};
use crate::sniff::{self, Magic};
use bzip2::read::BzDecoder;
use flate2::read::GzDecoder;
use std::fs;
use std::io::{self, Read};
use std::path::Path;
use tar::Archive;
use xz2::read::XzDecoder;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Zip,
    Tar,
    TarGz,
    TarXz,
    TarBz2,
    Gz,
    Xz,
    Bz2,
}

impl Format {
    /// The leading bytes this format must start with.
    fn magic(self) -> Magic {
        match self {
            Format::Zip => Magic::Zip,
            Format::Tar => Magic::Tar,
            Format::TarGz | Format::Gz => Magic::Gzip,
            Format::TarXz | Format::Xz => Magic::Xz,
            Format::TarBz2 | Format::Bz2 => Magic::Bzip2,
        }
    }

    fn from_magic(magic: Magic) -> Self {
        match magic {
            Magic::Zip => Format::Zip,
            Magic::Tar => Format::Tar,
            Magic::Gzip => Format::TarGz,
            Magic::Xz => Format::TarXz,
            Magic::Bzip2 => Format::TarBz2,
        }
    }
}

/// What happened to a downloaded file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Extraction {
    /// Archive contents were written to the destination directory.
    Unpacked(Format),
    /// The file has no extension and is itself the binary.
    Bare,
}

/// Format implied by the file name. `Ok(None)` means the suffix says nothing
/// and content sniffing decides.
pub fn format_from_name(file_name: &str) -> Result<Option<Format>> {
    let name = file_name.to_lowercase();

    if name.ends_with(".dmg") || name.ends_with(".pkg") {
        return Err(KelpError::UnsupportedFormat(file_name.to_string()));
    }

    let format = if name.ends_with(".zip") {
        Format::Zip
    } else if name.ends_with(".tar.gz") || name.ends_with(".tgz") {
        Format::TarGz
    } else if name.ends_with(".tar.xz") || name.ends_with(".txz") {
        Format::TarXz
    } else if name.ends_with(".tar.bz2") || name.ends_with(".tbz2") || name.ends_with(".tbz") {
        Format::TarBz2
    } else if name.ends_with(".tar") {
        Format::Tar
    } else if name.ends_with(".gz") {
        Format::Gz
    } else if name.ends_with(".xz") {
        Format::Xz
    } else if name.ends_with(".bz2") {
        Format::Bz2
    } else {
        return Ok(None);
    };
    Ok(Some(format))
}

/// Classifies `file_path` by name and content, then unpacks it into
/// `dest_dir`. Files without an extension are reported as [`Extraction::Bare`]
/// and left untouched.
pub fn extract(file_path: &Path, dest_dir: &Path) -> Result<Extraction> {
    let file_name = file_path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();

    let by_name = format_from_name(&file_name)?;
    if by_name.is_none() && extension(&file_name).is_none() {
        tracing::info!("Found unextractable file {}. Installing instead", file_name);
        return Ok(Extraction::Bare);
    }

    let sniffed = sniff::magic(&sniff::read_head(file_path)?);
    let format = match (by_name, sniffed) {
        (Some(format), Some(magic)) if format.magic() == magic => format,
        (Some(format), _) => {
            return Err(KelpError::extract(
                file_path,
                format!("content does not look like {:?}", format),
            ))
        }
        (None, Some(magic)) => Format::from_magic(magic),
        (None, None) => return Err(KelpError::UnsupportedFormat(file_name)),
    };

    tracing::info!("Extracting {} as {:?}", file_path.display(), format);
    fs::create_dir_all(dest_dir).at(dest_dir)?;

    let open = || fs::File::open(file_path).at(file_path);
    let unpacked = match format {
        Format::Zip => extract_zip(file_path, dest_dir),
        Format::Tar => unpack_tar(open()?, dest_dir),
        Format::TarGz => unpack_tar(GzDecoder::new(open()?), dest_dir),
        Format::TarXz => unpack_tar(XzDecoder::new(open()?), dest_dir),
        Format::TarBz2 => unpack_tar(BzDecoder::new(open()?), dest_dir),
        Format::Gz => decompress_single(GzDecoder::new(open()?), &file_name, dest_dir),
        Format::Xz => decompress_single(XzDecoder::new(open()?), &file_name, dest_dir),
        Format::Bz2 => decompress_single(BzDecoder::new(open()?), &file_name, dest_dir),
    };
    unpacked.map_err(|e| KelpError::extract(file_path, e))?;

    Ok(Extraction::Unpacked(format))
}

fn unpack_tar<R: Read>(reader: R, dest_dir: &Path) -> io::Result<()> {
    let mut archive = Archive::new(reader);
    archive.set_preserve_permissions(true);
    archive.unpack(dest_dir)
}

fn extract_zip(archive_path: &Path, dest_dir: &Path) -> io::Result<()> {
    let file = fs::File::open(archive_path)?;
    let mut archive = zip::ZipArchive::new(file).map_err(io::Error::other)?;

    for i in 0..archive.len() {
        let mut entry = archive.by_index(i).map_err(io::Error::other)?;
        let Some(relative) = entry.enclosed_name().map(|p| p.to_path_buf()) else {
            tracing::warn!("Skipping malicious path in zip: {}", entry.name());
            continue;
        };
        let outpath = dest_dir.join(relative);

        if entry.is_dir() {
            fs::create_dir_all(&outpath)?;
            continue;
        }
        if let Some(parent) = outpath.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut outfile = fs::File::create(&outpath)?;
        io::copy(&mut entry, &mut outfile)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            if let Some(mode) = entry.unix_mode() {
                fs::set_permissions(&outpath, fs::Permissions::from_mode(mode))?;
            }
        }
    }
    Ok(())
}

/// Single compressed file: `tool.gz` becomes `tool`.
fn decompress_single<R: Read>(mut reader: R, file_name: &str, dest_dir: &Path) -> io::Result<()> {
    let stem = match file_name.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem,
        _ => file_name,
    };
    let mut out = fs::File::create(dest_dir.join(stem))?;
    io::copy(&mut reader, &mut out)?;
    Ok(())
}
