use candle_core::{Device, Tensor};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use crate::data::dataset::ImageDataset;
use crate::error::{NnError, Result};

/// One mini-batch, resident on the loader's device.
///
/// - `images`: f32 `[batch, channels, height, width]`, values in `[0, 1]`
/// - `labels`: u32 `[batch]`
#[derive(Debug, Clone)]
pub struct Batch {
    pub images: Tensor,
    pub labels: Tensor,
}

impl Batch {
    /// Pairs an image tensor with its labels, checking the batch sizes agree.
    pub fn new(images: Tensor, labels: Tensor) -> Result<Self> {
        let image_dims = images.dims().to_vec();
        let label_dims = labels.dims().to_vec();
        if image_dims.len() != 4 || label_dims.len() != 1 || image_dims[0] != label_dims[0] {
            return Err(NnError::ShapeMismatch {
                context: "batch images vs labels".into(),
                expected: vec![label_dims.first().copied().unwrap_or(0)],
                got: image_dims,
            });
        }
        Ok(Batch { images, labels })
    }

    pub fn len(&self) -> usize {
        self.images.dims()[0]
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Finite, restartable mini-batch source over an [`ImageDataset`].
///
/// Every call to [`BatchLoader::iter`] starts a new pass; with shuffling on,
/// each pass visits the samples in a fresh random order. A pass is
/// exhaustive: the last batch may be smaller than `batch_size`.
pub struct BatchLoader {
    dataset: ImageDataset,
    batch_size: usize,
    shuffle: bool,
    rng: StdRng,
    device: Device,
}

impl BatchLoader {
    pub fn new(dataset: ImageDataset, batch_size: usize, device: &Device) -> Result<Self> {
        if batch_size == 0 {
            return Err(NnError::InvalidConfig("batch_size must be at least 1".into()));
        }
        Ok(BatchLoader {
            dataset,
            batch_size,
            shuffle: true,
            rng: StdRng::from_entropy(),
            device: device.clone(),
        })
    }

    pub fn shuffle(mut self, shuffle: bool) -> Self {
        self.shuffle = shuffle;
        self
    }

    /// Makes the shuffle order reproducible.
    pub fn seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    pub fn dataset(&self) -> &ImageDataset {
        &self.dataset
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn device(&self) -> &Device {
        &self.device
    }

    pub fn num_batches(&self) -> usize {
        self.dataset.len().div_ceil(self.batch_size)
    }

    /// Starts a new pass over the dataset.
    pub fn iter(&mut self) -> Batches<'_> {
        let mut order: Vec<usize> = (0..self.dataset.len()).collect();
        if self.shuffle {
            order.shuffle(&mut self.rng);
        }
        Batches { loader: self, order, cursor: 0 }
    }

    fn gather(&self, indices: &[usize]) -> Result<Batch> {
        let (c, h, w) = self.dataset.sample_shape();
        let mut pixels = Vec::with_capacity(indices.len() * self.dataset.sample_len());
        let mut labels = Vec::with_capacity(indices.len());
        for &i in indices {
            let (sample, label) = self.dataset.get(i)?;
            pixels.extend(sample.iter().map(|&p| p as f32 / 255.0));
            labels.push(label as u32);
        }
        let b = indices.len();
        let images = Tensor::from_vec(pixels, (b, c, h, w), &self.device)?;
        let labels = Tensor::from_vec(labels, b, &self.device)?;
        Batch::new(images, labels)
    }
}

/// Iterator over the batches of one pass.
pub struct Batches<'a> {
    loader: &'a BatchLoader,
    order: Vec<usize>,
    cursor: usize,
}

impl Iterator for Batches<'_> {
    type Item = Result<Batch>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.cursor >= self.order.len() {
            return None;
        }
        let end = (self.cursor + self.loader.batch_size).min(self.order.len());
        let batch = self.loader.gather(&self.order[self.cursor..end]);
        self.cursor = end;
        Some(batch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dataset(n: usize) -> ImageDataset {
        // Every pixel of sample i equals i, label is i % 10.
        let pixels = (0..n).flat_map(|i| std::iter::repeat(i as u8).take(3 * 4 * 4)).collect();
        let labels = (0..n).map(|i| (i % 10) as u8).collect();
        ImageDataset::new(pixels, labels, (3, 4, 4), 10).unwrap()
    }

    #[test]
    fn batches_cover_every_sample_once() {
        let mut loader = BatchLoader::new(dataset(23), 5, &Device::Cpu).unwrap().seed(7);
        assert_eq!(loader.num_batches(), 5);

        let mut seen = Vec::new();
        let mut sizes = Vec::new();
        for batch in loader.iter() {
            let batch = batch.unwrap();
            sizes.push(batch.len());
            let firsts = batch.images.flatten_from(1).unwrap().narrow(1, 0, 1).unwrap();
            seen.extend(firsts.flatten_all().unwrap().to_vec1::<f32>().unwrap());
        }
        assert_eq!(sizes, vec![5, 5, 5, 5, 3]);

        let mut ids: Vec<usize> = seen.iter().map(|v| (v * 255.0).round() as usize).collect();
        ids.sort_unstable();
        assert_eq!(ids, (0..23).collect::<Vec<_>>());
    }

    #[test]
    fn images_are_scaled_to_unit_range_and_labels_match() {
        let mut loader = BatchLoader::new(dataset(3), 3, &Device::Cpu).unwrap().shuffle(false);
        let batch = loader.iter().next().unwrap().unwrap();

        assert_eq!(batch.images.dims(), &[3, 3, 4, 4]);
        assert_eq!(batch.labels.to_vec1::<u32>().unwrap(), vec![0, 1, 2]);
        let max = batch.images.flatten_all().unwrap().max(0).unwrap();
        approx::assert_relative_eq!(max.to_scalar::<f32>().unwrap(), 2.0 / 255.0);
    }

    #[test]
    fn each_pass_is_reshuffled() {
        let mut loader = BatchLoader::new(dataset(50), 50, &Device::Cpu).unwrap().seed(1);
        let first = loader.iter().next().unwrap().unwrap().labels.to_vec1::<u32>().unwrap();
        let second = loader.iter().next().unwrap().unwrap().labels.to_vec1::<u32>().unwrap();
        assert_ne!(first, second);
    }

    #[test]
    fn zero_batch_size_is_rejected() {
        assert!(matches!(
            BatchLoader::new(dataset(1), 0, &Device::Cpu),
            Err(NnError::InvalidConfig(_))
        ));
    }
}
