use crate::error::{KelpError, Result};
use std::fmt;
use std::sync::OnceLock;

pub const MACH_BINARY: &str = "application/x-mach-binary";
pub const ELF_EXECUTABLE: &str = "application/x-executable";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OsFamily {
    MacOs,
    Linux,
}

impl fmt::Display for OsFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OsFamily::MacOs => write!(f, "macos"),
            OsFamily::Linux => write!(f, "linux"),
        }
    }
}

/// What the host can run: OS family, normalized architecture and the content
/// type its native executables sniff as.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Capabilities {
    pub os: OsFamily,
    pub arch: String,
    pub executable_content_type: &'static str,
}

impl Capabilities {
    /// Builds capabilities from Rust's `std::env::consts` style names.
    pub fn from_parts(os: &str, arch: &str) -> Result<Self> {
        let (os_family, executable_content_type) = match os {
            "macos" => (OsFamily::MacOs, MACH_BINARY),
            "linux" => (OsFamily::Linux, ELF_EXECUTABLE),
            _ => {
                return Err(KelpError::UnsupportedPlatform {
                    os: os.to_string(),
                    arch: arch.to_string(),
                })
            }
        };

        Ok(Self {
            os: os_family,
            arch: normalize_arch(arch),
            executable_content_type,
        })
    }

    /// The running host, computed once per process.
    pub fn current() -> Result<&'static Capabilities> {
        static CURRENT: OnceLock<Capabilities> = OnceLock::new();

        if let Some(caps) = CURRENT.get() {
            return Ok(caps);
        }
        let caps = Self::from_parts(std::env::consts::OS, std::env::consts::ARCH)?;
        tracing::debug!("Host capabilities: {:?}", caps);
        Ok(CURRENT.get_or_init(|| caps))
    }
}

/// Maps toolchain architecture names to the tokens release artifacts use most.
pub fn normalize_arch(arch: &str) -> String {
    match arch {
        "x86_64" => "amd64".to_string(),
        "aarch64" => "arm64".to_string(),
        other => other.to_lowercase(),
    }
}
