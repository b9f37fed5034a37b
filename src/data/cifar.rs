//! CIFAR-10, binary release.
//!
//! Each `.bin` file is a flat sequence of 3073-byte records:
//! ```text
//! byte  0:        label in [0, 9]
//! bytes 1..1025:  red plane,   32×32, row-major
//! bytes 1025..2049: green plane
//! bytes 2049..3073: blue plane
//! ```
//! The planes are already in CHW order, so records map directly onto
//! `[3, 32, 32]` samples.

use std::fs;
use std::path::{Path, PathBuf};

use crate::data::dataset::ImageDataset;
use crate::data::download::{download_file, extract_tar_gz, file_md5};
use crate::data::error::DataError;

pub const CIFAR10_URL: &str = "https://www.cs.toronto.edu/~kriz/cifar-10-binary.tar.gz";
pub const CIFAR10_MD5: &str = "c32a1d4ab5d03f1284b67883e8d87530";
const ARCHIVE_NAME: &str = "cifar-10-binary.tar.gz";
const BATCHES_DIR: &str = "cifar-10-batches-bin";

pub const CHANNELS: usize = 3;
pub const SIDE: usize = 32;
pub const NUM_CLASSES: usize = 10;
const IMAGE_BYTES: usize = CHANNELS * SIDE * SIDE;
const RECORD_BYTES: usize = 1 + IMAGE_BYTES;

pub const CIFAR10_CLASSES: [&str; NUM_CLASSES] = [
    "airplane", "automobile", "bird", "cat", "deer",
    "dog", "frog", "horse", "ship", "truck",
];

const TRAIN_FILES: [&str; 5] = [
    "data_batch_1.bin",
    "data_batch_2.bin",
    "data_batch_3.bin",
    "data_batch_4.bin",
    "data_batch_5.bin",
];
const TEST_FILES: [&str; 1] = ["test_batch.bin"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Split {
    Train,
    Test,
}

impl Split {
    /// Batch file names making up this split.
    pub fn files(self) -> &'static [&'static str] {
        match self {
            Split::Train => &TRAIN_FILES,
            Split::Test => &TEST_FILES,
        }
    }
}

/// Locates and decodes the CIFAR-10 binary release under `root`.
#[derive(Debug, Clone)]
pub struct Cifar10 {
    root: PathBuf,
    download: bool,
}

impl Cifar10 {
    /// `root` is the storage directory; `download` allows fetching the
    /// archive when the batch files are missing.
    pub fn new(root: impl Into<PathBuf>, download: bool) -> Self {
        Cifar10 { root: root.into(), download }
    }

    pub fn batches_dir(&self) -> PathBuf {
        self.root.join(BATCHES_DIR)
    }

    /// Loads one split, downloading the archive first if allowed and needed.
    pub fn load(&self, split: Split) -> Result<ImageDataset, DataError> {
        self.ensure_present()?;
        let dir = self.batches_dir();
        let parts = split
            .files()
            .iter()
            .map(|name| parse_batch_file(&dir.join(name)))
            .collect::<Result<Vec<_>, _>>()?;
        let dataset = ImageDataset::concat(parts)?;
        tracing::info!(?split, samples = dataset.len(), "loaded CIFAR-10 split");
        Ok(dataset)
    }

    fn missing_files(&self) -> Vec<PathBuf> {
        let dir = self.batches_dir();
        TRAIN_FILES
            .iter()
            .chain(TEST_FILES.iter())
            .map(|name| dir.join(name))
            .filter(|p| !p.is_file())
            .collect()
    }

    fn ensure_present(&self) -> Result<(), DataError> {
        let missing = self.missing_files();
        let first_missing = match missing.into_iter().next() {
            None => return Ok(()),
            Some(path) => path,
        };
        if !self.download {
            return Err(DataError::FileNotFound(first_missing));
        }

        fs::create_dir_all(&self.root)?;
        let archive = self.root.join(ARCHIVE_NAME);
        let cached = archive.is_file() && file_md5(&archive)? == CIFAR10_MD5;
        if !cached {
            download_file(CIFAR10_URL, &archive, Some(CIFAR10_MD5))?;
        }
        extract_tar_gz(&archive, &self.root)?;

        match self.missing_files().into_iter().next() {
            None => Ok(()),
            Some(path) => Err(DataError::FileNotFound(path)),
        }
    }
}

/// Decodes one `.bin` batch file.
pub fn parse_batch_file(path: &Path) -> Result<ImageDataset, DataError> {
    let bytes = fs::read(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => DataError::FileNotFound(path.to_path_buf()),
        _ => DataError::Io(e),
    })?;
    parse_records(&bytes).map_err(|e| match e {
        DataError::Format(msg) => DataError::Format(format!("{}: {msg}", path.display())),
        other => other,
    })
}

/// Decodes an in-memory sequence of CIFAR-10 records.
pub fn parse_records(bytes: &[u8]) -> Result<ImageDataset, DataError> {
    if bytes.is_empty() || bytes.len() % RECORD_BYTES != 0 {
        return Err(DataError::Format(format!(
            "{} bytes is not a positive multiple of the {RECORD_BYTES}-byte record size",
            bytes.len()
        )));
    }

    let n = bytes.len() / RECORD_BYTES;
    let mut labels = Vec::with_capacity(n);
    let mut pixels = Vec::with_capacity(n * IMAGE_BYTES);
    for record in bytes.chunks_exact(RECORD_BYTES) {
        labels.push(record[0]);
        pixels.extend_from_slice(&record[1..]);
    }

    ImageDataset::new(pixels, labels, (CHANNELS, SIDE, SIDE), NUM_CLASSES)
}

/// Encodes samples back into the record layout. Used to build fixtures.
pub fn encode_records(samples: &[(u8, Vec<u8>)]) -> Vec<u8> {
    let mut out = Vec::with_capacity(samples.len() * RECORD_BYTES);
    for (label, image) in samples {
        out.push(*label);
        out.extend_from_slice(image);
    }
    out
}
