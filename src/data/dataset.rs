use crate::data::error::DataError;

/// An in-memory labeled image collection.
///
/// Pixels are stored as raw `u8` in channel-major (CHW) order per sample, so
/// sample `i` occupies `pixels[i * sample_len .. (i + 1) * sample_len]` where
/// `sample_len = channels * height * width`. Normalization to `[0, 1]`
/// happens when a batch tensor is built.
#[derive(Debug, Clone)]
pub struct ImageDataset {
    pixels: Vec<u8>,
    labels: Vec<u8>,
    channels: usize,
    height: usize,
    width: usize,
    num_classes: usize,
}

impl ImageDataset {
    /// Builds a dataset, validating that pixel and label counts agree and
    /// that every label is a valid class index.
    pub fn new(
        pixels: Vec<u8>,
        labels: Vec<u8>,
        (channels, height, width): (usize, usize, usize),
        num_classes: usize,
    ) -> Result<Self, DataError> {
        let sample_len = channels * height * width;
        if sample_len == 0 {
            return Err(DataError::Format(format!(
                "sample shape [{channels}, {height}, {width}] has no pixels"
            )));
        }
        if pixels.len() != labels.len() * sample_len {
            return Err(DataError::Format(format!(
                "{} pixel bytes do not match {} labels of {} bytes each",
                pixels.len(),
                labels.len(),
                sample_len
            )));
        }
        if let Some((index, &label)) = labels
            .iter()
            .enumerate()
            .find(|(_, &l)| l as usize >= num_classes)
        {
            return Err(DataError::LabelOutOfRange { index, label, num_classes });
        }

        Ok(ImageDataset { pixels, labels, channels, height, width, num_classes })
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// `(channels, height, width)` of every sample.
    pub fn sample_shape(&self) -> (usize, usize, usize) {
        (self.channels, self.height, self.width)
    }

    pub fn sample_len(&self) -> usize {
        self.channels * self.height * self.width
    }

    pub fn num_classes(&self) -> usize {
        self.num_classes
    }

    pub fn labels(&self) -> &[u8] {
        &self.labels
    }

    /// Raw pixels and label of sample `index`.
    pub fn get(&self, index: usize) -> Result<(&[u8], u8), DataError> {
        if index >= self.len() {
            return Err(DataError::IndexOutOfBounds { index, len: self.len() });
        }
        let n = self.sample_len();
        Ok((&self.pixels[index * n..(index + 1) * n], self.labels[index]))
    }

    /// Concatenates several datasets with identical sample shapes.
    pub fn concat(parts: Vec<ImageDataset>) -> Result<Self, DataError> {
        let mut iter = parts.into_iter();
        let mut first = match iter.next() {
            Some(first) => first,
            None => return Err(DataError::Format("no dataset parts to concatenate".into())),
        };
        for part in iter {
            if part.sample_shape() != first.sample_shape() || part.num_classes != first.num_classes {
                return Err(DataError::Format(format!(
                    "cannot concatenate samples of shape {:?} with {:?}",
                    part.sample_shape(),
                    first.sample_shape()
                )));
            }
            first.pixels.extend_from_slice(&part.pixels);
            first.labels.extend_from_slice(&part.labels);
        }
        Ok(first)
    }
}
