//! Content-type sniffing from magic bytes.
//!
//! Covers what the installer and the extractor need to tell apart: native
//! executables (ELF, Mach-O) and the compressed/archive containers releases
//! ship in.

use crate::error::{IoContext, Result};
use crate::platform::{ELF_EXECUTABLE, MACH_BINARY};
use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::Path;

pub const ELF_SHAREDLIB: &str = "application/x-sharedlib";
pub const SHELL_SCRIPT: &str = "text/x-shellscript";
pub const OCTET_STREAM: &str = "application/octet-stream";

/// Bytes read from the head of a file. Large enough for the tar header magic
/// and typical ELF program header tables.
const SNIFF_LEN: usize = 4096;

const ET_EXEC: u16 = 2;
const ET_DYN: u16 = 3;
const PT_DYNAMIC: u32 = 2;
const PT_INTERP: u32 = 3;
const DT_NULL: u64 = 0;
const DT_FLAGS_1: u64 = 0x6fff_fffb;
const DF_1_PIE: u64 = 0x0800_0000;

/// Cap on how much of a dynamic segment is read from disk.
const MAX_DYNAMIC_LEN: u64 = 64 * 1024;

/// Container formats recognizable by their leading bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Magic {
    Zip,
    Gzip,
    Xz,
    Bzip2,
    Tar,
}

pub fn read_head(path: &Path) -> Result<Vec<u8>> {
    let file = File::open(path).at(path)?;
    let mut head = Vec::with_capacity(SNIFF_LEN);
    file.take(SNIFF_LEN as u64).read_to_end(&mut head).at(path)?;
    Ok(head)
}

fn read_range(path: &Path, offset: u64, len: u64) -> io::Result<Vec<u8>> {
    let mut file = File::open(path)?;
    file.seek(SeekFrom::Start(offset))?;
    let mut buf = Vec::new();
    file.take(len).read_to_end(&mut buf)?;
    Ok(buf)
}

/// Content type of a file on disk. ELF segments past the sniffed head
/// (the dynamic section of a static PIE) are read on demand.
pub fn detect_file(path: &Path) -> Result<&'static str> {
    let head = read_head(path)?;
    Ok(classify(&head, &|offset, len| match read_range(path, offset, len) {
        Ok(buf) => Some(buf),
        Err(e) => {
            tracing::debug!("Could not read ELF segment of {}: {}", path.display(), e);
            None
        }
    }))
}

/// Content type of an in-memory buffer.
pub fn content_type(head: &[u8]) -> &'static str {
    classify(head, &|offset, len| {
        let start = usize::try_from(offset).ok()?;
        let end = start.checked_add(usize::try_from(len).ok()?)?;
        head.get(start..end.min(head.len())).map(<[u8]>::to_vec)
    })
}

type SegmentLoader<'a> = dyn Fn(u64, u64) -> Option<Vec<u8>> + 'a;

fn classify(head: &[u8], load: &SegmentLoader<'_>) -> &'static str {
    if let Some(kind) = elf_kind(head, load) {
        return kind;
    }
    if is_mach_o(head) {
        return MACH_BINARY;
    }
    if head.starts_with(b"#!") {
        return SHELL_SCRIPT;
    }
    OCTET_STREAM
}

pub fn magic(head: &[u8]) -> Option<Magic> {
    if head.starts_with(b"PK\x03\x04") || head.starts_with(b"PK\x05\x06") {
        Some(Magic::Zip)
    } else if head.starts_with(&[0x1f, 0x8b]) {
        Some(Magic::Gzip)
    } else if head.starts_with(&[0xfd, b'7', b'z', b'X', b'Z', 0x00]) {
        Some(Magic::Xz)
    } else if head.starts_with(b"BZh") {
        Some(Magic::Bzip2)
    } else if head.len() >= 262 && &head[257..262] == b"ustar" {
        Some(Magic::Tar)
    } else {
        None
    }
}

fn elf_kind(head: &[u8], load: &SegmentLoader<'_>) -> Option<&'static str> {
    if head.len() < 20 || !head.starts_with(b"\x7fELF") {
        return None;
    }
    let is_64 = head[4] == 2;
    let little = head[5] == 1;

    match read_u16(head, 16, little)? {
        ET_EXEC => Some(ELF_EXECUTABLE),
        ET_DYN => {
            let headers = program_headers(head, is_64, little);
            // dynamically linked PIEs name an interpreter, static PIEs set DF_1_PIE
            let is_pie = headers.iter().any(|h| h.p_type == PT_INTERP)
                || headers
                    .iter()
                    .filter(|h| h.p_type == PT_DYNAMIC)
                    .any(|h| has_pie_flag(h, is_64, little, load));
            Some(if is_pie { ELF_EXECUTABLE } else { ELF_SHAREDLIB })
        }
        _ => Some(OCTET_STREAM),
    }
}

struct ProgramHeader {
    p_type: u32,
    offset: u64,
    file_size: u64,
}

/// Program headers that fit in `head`. A table running past the buffer is
/// cut short rather than rejected.
fn program_headers(head: &[u8], is_64: bool, little: bool) -> Vec<ProgramHeader> {
    let table = if is_64 {
        read_u64(head, 32, little)
            .and_then(|off| usize::try_from(off).ok())
            .zip(read_u16(head, 54, little))
            .zip(read_u16(head, 56, little))
    } else {
        read_u32(head, 28, little)
            .and_then(|off| usize::try_from(off).ok())
            .zip(read_u16(head, 42, little))
            .zip(read_u16(head, 44, little))
    };
    let Some(((phoff, phentsize), phnum)) = table else {
        return Vec::new();
    };

    let mut headers = Vec::new();
    for i in 0..usize::from(phnum) {
        let header = usize::from(phentsize)
            .checked_mul(i)
            .and_then(|rel| phoff.checked_add(rel))
            .and_then(|base| program_header(head, base, is_64, little));
        match header {
            Some(header) => headers.push(header),
            None => break,
        }
    }
    headers
}

fn program_header(head: &[u8], base: usize, is_64: bool, little: bool) -> Option<ProgramHeader> {
    if is_64 {
        Some(ProgramHeader {
            p_type: read_u32(head, base, little)?,
            offset: read_u64(head, base.checked_add(8)?, little)?,
            file_size: read_u64(head, base.checked_add(32)?, little)?,
        })
    } else {
        Some(ProgramHeader {
            p_type: read_u32(head, base, little)?,
            offset: u64::from(read_u32(head, base.checked_add(4)?, little)?),
            file_size: u64::from(read_u32(head, base.checked_add(16)?, little)?),
        })
    }
}

/// Scans the dynamic segment for `DT_FLAGS_1` and checks `DF_1_PIE`.
fn has_pie_flag(dynamic: &ProgramHeader, is_64: bool, little: bool, load: &SegmentLoader<'_>) -> bool {
    let Some(section) = load(dynamic.offset, dynamic.file_size.min(MAX_DYNAMIC_LEN)) else {
        return false;
    };

    let entry_len = if is_64 { 16 } else { 8 };
    for entry in section.chunks_exact(entry_len) {
        let pair = if is_64 {
            read_u64(entry, 0, little).zip(read_u64(entry, 8, little))
        } else {
            read_u32(entry, 0, little)
                .zip(read_u32(entry, 4, little))
                .map(|(tag, val)| (u64::from(tag), u64::from(val)))
        };
        match pair {
            Some((DT_NULL, _)) | None => return false,
            Some((DT_FLAGS_1, flags)) => return flags & DF_1_PIE != 0,
            Some(_) => {}
        }
    }
    false
}

fn is_mach_o(head: &[u8]) -> bool {
    let Some(word) = head.get(0..4) else {
        return false;
    };
    match word {
        [0xfe, 0xed, 0xfa, 0xce | 0xcf] | [0xce | 0xcf, 0xfa, 0xed, 0xfe] => true,
        // universal binaries share 0xcafebabe with Java class files, which
        // carry a class version >= 45 where the fat header has its arch count
        [0xca, 0xfe, 0xba, 0xbe] => {
            matches!(read_u32(head, 4, false), Some(n) if n > 0 && n < 45)
        }
        _ => false,
    }
}

fn read_u16(buf: &[u8], at: usize, little: bool) -> Option<u16> {
    let bytes: [u8; 2] = buf.get(at..at.checked_add(2)?)?.try_into().ok()?;
    Some(if little {
        u16::from_le_bytes(bytes)
    } else {
        u16::from_be_bytes(bytes)
    })
}

fn read_u32(buf: &[u8], at: usize, little: bool) -> Option<u32> {
    let bytes: [u8; 4] = buf.get(at..at.checked_add(4)?)?.try_into().ok()?;
    Some(if little {
        u32::from_le_bytes(bytes)
    } else {
        u32::from_be_bytes(bytes)
    })
}

fn read_u64(buf: &[u8], at: usize, little: bool) -> Option<u64> {
    let bytes: [u8; 8] = buf.get(at..at.checked_add(8)?)?.try_into().ok()?;
    Some(if little {
        u64::from_le_bytes(bytes)
    } else {
        u64::from_be_bytes(bytes)
    })
}
