//! HTTP download with MD5 verification, and tar.gz extraction.

use std::fs::{self, File};
use std::io::{BufWriter, Read, Write};
use std::path::Path;

use flate2::read::GzDecoder;
use md5::{Digest, Md5};

use crate::data::error::DataError;

const CHUNK: usize = 64 * 1024;

/// Downloads `url` to `dest_path`, streaming through an MD5 hasher.
///
/// The body is written to `<dest_path>.part` and only renamed into place once
/// the checksum (when given) matches, so an interrupted download never
/// leaves a file that looks complete.
pub fn download_file(url: &str, dest_path: &Path, expected_md5: Option<&str>) -> Result<(), DataError> {
    tracing::warn!(url, dest = %dest_path.display(), "downloading");

    let response = ureq::get(url)
        .call()
        .map_err(|e| DataError::Download(format!("request to {url} failed: {e}")))?;

    if let Some(parent) = dest_path.parent() {
        fs::create_dir_all(parent)?;
    }
    let part_path = dest_path.with_extension("part");
    let mut writer = BufWriter::new(File::create(&part_path)?);
    let mut reader = response.into_reader();
    let mut hasher = Md5::new();
    let mut buf = vec![0u8; CHUNK];
    let mut total = 0usize;

    loop {
        let n = reader
            .read(&mut buf)
            .map_err(|e| DataError::Download(format!("reading response body failed: {e}")))?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
        writer.write_all(&buf[..n])?;
        total += n;
    }
    writer.flush()?;
    drop(writer);

    let actual = format!("{:x}", hasher.finalize());
    if let Some(expected) = expected_md5 {
        if actual != expected {
            fs::remove_file(&part_path)?;
            return Err(DataError::ChecksumMismatch { expected: expected.to_string(), got: actual });
        }
    }

    fs::rename(&part_path, dest_path)?;
    tracing::info!(bytes = total, md5 = %actual, "download complete");
    Ok(())
}

/// Unpacks a gzip-compressed tar archive into `dest_dir`.
pub fn extract_tar_gz(archive_path: &Path, dest_dir: &Path) -> Result<(), DataError> {
    let file = File::open(archive_path)?;
    let mut archive = tar::Archive::new(GzDecoder::new(file));
    archive
        .unpack(dest_dir)
        .map_err(|e| DataError::Decompression(format!("{}: {e}", archive_path.display())))
}

/// Hex MD5 of a file on disk.
pub fn file_md5(path: &Path) -> Result<String, DataError> {
    let mut file = File::open(path)?;
    let mut hasher = Md5::new();
    let mut buf = vec![0u8; CHUNK];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(format!("{:x}", hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;

    #[test]
    fn md5_of_known_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("abc.txt");
        fs::write(&path, b"abc").unwrap();
        assert_eq!(file_md5(&path).unwrap(), "900150983cd24fb0d6963f7d28e17f72");
    }

    #[test]
    fn extracts_nested_entries() {
        let dir = tempfile::tempdir().unwrap();
        let archive_path = dir.path().join("bundle.tar.gz");

        let gz = GzEncoder::new(File::create(&archive_path).unwrap(), Compression::fast());
        let mut builder = tar::Builder::new(gz);
        let payload = b"hello";
        let mut header = tar::Header::new_gnu();
        header.set_size(payload.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder.append_data(&mut header, "inner/greeting.txt", &payload[..]).unwrap();
        builder.into_inner().unwrap().finish().unwrap();

        let out = dir.path().join("out");
        extract_tar_gz(&archive_path, &out).unwrap();
        assert_eq!(fs::read(out.join("inner/greeting.txt")).unwrap(), payload);
    }

    #[test]
    fn corrupt_archive_reports_decompression_error() {
        let dir = tempfile::tempdir().unwrap();
        let archive_path = dir.path().join("broken.tar.gz");
        fs::write(&archive_path, b"definitely not gzip").unwrap();
        let err = extract_tar_gz(&archive_path, dir.path()).unwrap_err();
        assert!(matches!(err, DataError::Decompression(_)));
    }
}
