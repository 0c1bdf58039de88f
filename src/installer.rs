use crate::error::{IoContext, KelpError, Result};
use crate::platform::{Capabilities, OsFamily};
use crate::sniff;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use walkdir::WalkDir;

const QUARANTINE_ATTR: &str = "com.apple.quarantine";

/// Copies every native executable found under `scratch_dir` into `bin_dir`,
/// keeping file names. Returns the installed paths in walk order.
pub fn install_binaries(caps: &Capabilities, scratch_dir: &Path, bin_dir: &Path) -> Result<Vec<PathBuf>> {
    tracing::info!("Checking for binary files in {}...", scratch_dir.display());

    let mut installed = Vec::new();
    for entry in WalkDir::new(scratch_dir).sort_by_file_name() {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(scratch_dir).to_path_buf();
            KelpError::io(path, e.into())
        })?;
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let content_type = sniff::detect_file(path)?;
        if content_type != caps.executable_content_type {
            tracing::debug!(
                "Skipping non executable file: {} - {}",
                path.display(),
                content_type
            );
            continue;
        }

        let file_name = entry.file_name().to_string_lossy().to_string();
        let dest = bin_dir.join(&file_name);
        // first one in walk order wins a name clash
        if installed.contains(&dest) {
            tracing::warn!(
                "Skipping {}: an executable named {} was already installed",
                path.display(),
                file_name
            );
            continue;
        }
        tracing::info!("Binary file {} found in extract", file_name);
        installed.push(copy_executable(path, &dest)?);
    }

    clear_quarantine(caps, &installed);
    Ok(installed)
}

/// Installs a downloaded file that is itself the binary under `name`.
/// Returns `None` when the file is not a native executable for this host.
pub fn install_bare(caps: &Capabilities, file: &Path, bin_dir: &Path, name: &str) -> Result<Option<PathBuf>> {
    let content_type = sniff::detect_file(file)?;
    if content_type != caps.executable_content_type {
        tracing::warn!(
            "{} is {}, not a {} executable",
            file.display(),
            content_type,
            caps.os
        );
        return Ok(None);
    }

    let dest = copy_executable(file, &bin_dir.join(name))?;
    clear_quarantine(caps, std::slice::from_ref(&dest));
    Ok(Some(dest))
}

fn copy_executable(source: &Path, dest: &Path) -> Result<PathBuf> {
    tracing::info!("Copying {} to {}", source.display(), dest.display());
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent).at(parent)?;
    }
    // replacing a running binary in place fails with ETXTBSY, unlinking does not
    if dest.exists() {
        fs::remove_file(dest).at(dest)?;
    }
    fs::copy(source, dest).at(dest)?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(dest, fs::Permissions::from_mode(0o755)).at(dest)?;
    }

    tracing::info!("Installed {}", dest.display());
    Ok(dest.to_path_buf())
}

/// Clears the download quarantine flag on macOS. A failure only means the
/// user gets a Gatekeeper prompt, so it is logged rather than returned.
pub fn clear_quarantine(caps: &Capabilities, paths: &[PathBuf]) {
    if caps.os != OsFamily::MacOs {
        return;
    }
    for path in paths {
        tracing::info!("Unquarantining {}...", path.display());
        match Command::new("xattr")
            .args(["-d", QUARANTINE_ATTR])
            .arg(path)
            .output()
        {
            Ok(output) if output.status.success() => {}
            Ok(output) => tracing::debug!(
                "xattr on {} exited with {}: {}",
                path.display(),
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            ),
            Err(e) => tracing::warn!("Could not run xattr on {}: {}", path.display(), e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sniff::fixtures::{elf64, mach_o_64, static_pie};
    use tempfile::TempDir;

    fn linux() -> Capabilities {
        Capabilities::from_parts("linux", "x86_64").unwrap()
    }

    #[test]
    fn test_installs_only_native_executables() {
        let tmp = TempDir::new().unwrap();
        let scratch = tmp.path().join("scratch");
        let bin = tmp.path().join("bin");
        fs::create_dir_all(scratch.join("tool-1.0/lib")).unwrap();

        fs::write(scratch.join("tool-1.0/tool"), elf64(2, 1)).unwrap();
        fs::write(scratch.join("tool-1.0/lib/libtool.so"), elf64(3, 1)).unwrap();
        fs::write(scratch.join("tool-1.0/README.md"), b"# tool").unwrap();
        fs::write(scratch.join("tool-1.0/install.sh"), b"#!/bin/sh\n").unwrap();
        fs::write(scratch.join("tool-1.0/tool-mac"), mach_o_64()).unwrap();

        let installed = install_binaries(&linux(), &scratch, &bin).unwrap();

        assert_eq!(installed, vec![bin.join("tool")]);
        assert!(!bin.join("README.md").exists());
        assert!(!bin.join("libtool.so").exists());
    }

    #[test]
    fn test_static_pie_binary_is_installed() {
        let tmp = TempDir::new().unwrap();
        let scratch = tmp.path().join("scratch");
        let bin = tmp.path().join("bin");
        fs::create_dir_all(scratch.join("ripgrep-14.1.0-x86_64-unknown-linux-musl")).unwrap();
        fs::write(
            scratch.join("ripgrep-14.1.0-x86_64-unknown-linux-musl/rg"),
            static_pie(),
        )
        .unwrap();

        let installed = install_binaries(&linux(), &scratch, &bin).unwrap();
        assert_eq!(installed, vec![bin.join("rg")]);
    }

    #[test]
    fn test_duplicate_names_install_once() {
        let tmp = TempDir::new().unwrap();
        let scratch = tmp.path().join("scratch");
        let bin = tmp.path().join("bin");
        fs::create_dir_all(scratch.join("a")).unwrap();
        fs::create_dir_all(scratch.join("b")).unwrap();
        let first = elf64(2, 1);
        let mut second = elf64(2, 1);
        second.push(0xff);
        fs::write(scratch.join("a/tool"), &first).unwrap();
        fs::write(scratch.join("b/tool"), &second).unwrap();

        let installed = install_binaries(&linux(), &scratch, &bin).unwrap();
        assert_eq!(installed, vec![bin.join("tool")]);
        assert_eq!(fs::read(bin.join("tool")).unwrap(), first);
    }

    #[test]
    fn test_macos_host_picks_mach_o() {
        let tmp = TempDir::new().unwrap();
        let scratch = tmp.path().join("scratch");
        let bin = tmp.path().join("bin");
        fs::create_dir_all(&scratch).unwrap();
        fs::write(scratch.join("tool-linux"), elf64(2, 1)).unwrap();
        fs::write(scratch.join("tool"), mach_o_64()).unwrap();

        let caps = Capabilities::from_parts("macos", "aarch64").unwrap();
        let installed = install_binaries(&caps, &scratch, &bin).unwrap();
        assert_eq!(installed, vec![bin.join("tool")]);
    }

    #[test]
    #[cfg(unix)]
    fn test_installed_binary_is_executable() {
        use std::os::unix::fs::PermissionsExt;

        let tmp = TempDir::new().unwrap();
        let scratch = tmp.path().join("scratch");
        fs::create_dir_all(&scratch).unwrap();
        fs::write(scratch.join("tool"), elf64(3, 3)).unwrap();

        let installed = install_binaries(&linux(), &scratch, &tmp.path().join("bin")).unwrap();
        let mode = fs::metadata(&installed[0]).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o755);
    }

    #[test]
    fn test_reinstall_overwrites_existing_binary() {
        let tmp = TempDir::new().unwrap();
        let bin = tmp.path().join("bin");
        fs::create_dir_all(&bin).unwrap();
        fs::write(bin.join("tool"), b"old").unwrap();

        let file = tmp.path().join("tool.linux-amd64");
        let new = elf64(2, 1);
        fs::write(&file, &new).unwrap();

        let dest = install_bare(&linux(), &file, &bin, "tool").unwrap();
        assert_eq!(dest, Some(bin.join("tool")));
        assert_eq!(fs::read(bin.join("tool")).unwrap(), new);
    }

    #[test]
    fn test_bare_non_executable_is_skipped() {
        let tmp = TempDir::new().unwrap();
        let file = tmp.path().join("tool-linux-amd64");
        fs::write(&file, b"<html>not found</html>").unwrap();

        let dest = install_bare(&linux(), &file, &tmp.path().join("bin"), "tool").unwrap();
        assert!(dest.is_none());
        assert!(!tmp.path().join("bin/tool").exists());
    }

    #[test]
    fn test_empty_scratch_installs_nothing() {
        let tmp = TempDir::new().unwrap();
        let installed = install_binaries(&linux(), tmp.path(), &tmp.path().join("bin")).unwrap();
        assert!(installed.is_empty());
    }
}
