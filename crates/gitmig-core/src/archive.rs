//! Archive codec for GitLab export containers.
//!
//! Exports travel as gzip-compressed tar archives. Extraction and creation
//! are pure functions over bytes and a directory; creation enumerates
//! entries in lexicographic order so identical directory contents always
//! produce the same archive.

use std::collections::BTreeSet;
use std::io::Write;
use std::path::Path;

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use tracing::debug;

use crate::domain::error::{MigrateError, Result};

/// Unpack a gzip-compressed tar archive into `dir`.
pub fn extract(archive_bytes: &[u8], dir: &Path) -> Result<()> {
    let gz = GzDecoder::new(archive_bytes);
    let mut tar = tar::Archive::new(gz);
    std::fs::create_dir_all(dir)?;
    tar.unpack(dir)
        .map_err(|e| MigrateError::ArchiveFormat(format!("cannot unpack archive: {e}")))?;
    debug!(dir = %dir.display(), "extracted archive");
    Ok(())
}

/// Pack `dir`'s contents into a gzip-compressed tar archive in memory.
///
/// Top-level entries whose file name is in `exclude` are skipped entirely.
/// All paths inside the archive are relative to `dir`.
pub fn create(dir: &Path, exclude: &BTreeSet<String>) -> Result<Vec<u8>> {
    let gz = GzEncoder::new(Vec::new(), Compression::default());
    let mut tar = tar::Builder::new(gz);
    // Symlinks are archived as links, never resolved.
    tar.follow_symlinks(false);

    for entry in sorted_entries(dir)? {
        let name = entry.file_name().to_string_lossy().into_owned();
        if exclude.contains(&name) {
            debug!(entry = %name, "excluded from archive");
            continue;
        }
        append_entry(&mut tar, &entry.path(), &name)?;
    }

    let bytes = tar
        .into_inner()
        .map_err(|e| MigrateError::ArchiveFormat(format!("cannot finalise tar: {e}")))?
        .finish()
        .map_err(|e| MigrateError::ArchiveFormat(format!("cannot finalise gzip: {e}")))?;
    Ok(bytes)
}

fn sorted_entries(dir: &Path) -> Result<Vec<std::fs::DirEntry>> {
    let mut entries: Vec<_> = std::fs::read_dir(dir)?.collect::<std::io::Result<_>>()?;
    entries.sort_by_key(|e| e.file_name());
    Ok(entries)
}

/// Append one filesystem entry under its archive path, recursing into
/// directories in lexicographic order. Directories get their own entry so
/// empty ones survive the round trip; symlinks stay symlinks.
fn append_entry<W: Write>(tar: &mut tar::Builder<W>, path: &Path, archive_path: &str) -> Result<()> {
    let file_type = std::fs::symlink_metadata(path)?.file_type();
    if file_type.is_dir() {
        tar.append_dir(archive_path, path)
            .map_err(|e| MigrateError::ArchiveFormat(format!("cannot append {archive_path}: {e}")))?;
        for entry in sorted_entries(path)? {
            let child = format!("{archive_path}/{}", entry.file_name().to_string_lossy());
            append_entry(tar, &entry.path(), &child)?;
        }
    } else {
        tar.append_path_with_name(path, archive_path)
            .map_err(|e| MigrateError::ArchiveFormat(format!("cannot append {archive_path}: {e}")))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exclude(names: &[&str]) -> BTreeSet<String> {
        names.iter().map(|s| (*s).to_string()).collect()
    }

    #[test]
    fn round_trips_files_and_directories() {
        let src = tempfile::tempdir().unwrap();
        std::fs::write(src.path().join("a.txt"), b"alpha").unwrap();
        std::fs::create_dir(src.path().join("sub")).unwrap();
        std::fs::write(src.path().join("sub/b.txt"), b"beta").unwrap();

        let bytes = create(src.path(), &BTreeSet::new()).unwrap();
        let dst = tempfile::tempdir().unwrap();
        extract(&bytes, dst.path()).unwrap();

        assert_eq!(std::fs::read(dst.path().join("a.txt")).unwrap(), b"alpha");
        assert_eq!(
            std::fs::read(dst.path().join("sub/b.txt")).unwrap(),
            b"beta"
        );
    }

    #[test]
    fn excluded_top_level_entries_are_skipped() {
        let src = tempfile::tempdir().unwrap();
        std::fs::write(src.path().join("keep.txt"), b"keep").unwrap();
        std::fs::write(src.path().join("drop.tar.gz"), b"drop").unwrap();

        let bytes = create(src.path(), &exclude(&["drop.tar.gz"])).unwrap();
        let dst = tempfile::tempdir().unwrap();
        extract(&bytes, dst.path()).unwrap();

        assert!(dst.path().join("keep.txt").exists());
        assert!(!dst.path().join("drop.tar.gz").exists());
    }

    #[test]
    fn creation_is_deterministic() {
        let src = tempfile::tempdir().unwrap();
        std::fs::write(src.path().join("z.txt"), b"z").unwrap();
        std::fs::write(src.path().join("a.txt"), b"a").unwrap();
        std::fs::create_dir(src.path().join("m")).unwrap();
        std::fs::write(src.path().join("m/n.txt"), b"n").unwrap();

        let first = create(src.path(), &BTreeSet::new()).unwrap();
        let second = create(src.path(), &BTreeSet::new()).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn empty_directories_round_trip() {
        let src = tempfile::tempdir().unwrap();
        std::fs::create_dir(src.path().join("hooks")).unwrap();
        std::fs::create_dir_all(src.path().join("refs/heads")).unwrap();

        let bytes = create(src.path(), &BTreeSet::new()).unwrap();
        let dst = tempfile::tempdir().unwrap();
        extract(&bytes, dst.path()).unwrap();

        assert!(dst.path().join("hooks").is_dir());
        assert!(dst.path().join("refs/heads").is_dir());
    }

    #[cfg(unix)]
    #[test]
    fn symlinks_round_trip_as_links() {
        let src = tempfile::tempdir().unwrap();
        std::fs::write(src.path().join("target.txt"), b"data").unwrap();
        std::os::unix::fs::symlink("target.txt", src.path().join("link.txt")).unwrap();

        let bytes = create(src.path(), &BTreeSet::new()).unwrap();
        let dst = tempfile::tempdir().unwrap();
        extract(&bytes, dst.path()).unwrap();

        let link = dst.path().join("link.txt");
        assert!(std::fs::symlink_metadata(&link).unwrap().file_type().is_symlink());
        assert_eq!(std::fs::read_link(&link).unwrap(), Path::new("target.txt"));
        assert_eq!(std::fs::read(&link).unwrap(), b"data");
    }

    #[test]
    fn malformed_input_is_an_archive_format_error() {
        let dst = tempfile::tempdir().unwrap();
        let err = extract(b"this is not a tarball", dst.path()).unwrap_err();
        assert!(matches!(err, MigrateError::ArchiveFormat(_)));
    }
}
