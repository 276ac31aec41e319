use anyhow::{bail, Context, Result};
use ndarray::{Array4, ArrayView3, Axis};

/// Side length of the zero-filled frames returned when generation fails.
pub const PLACEHOLDER_SIDE: usize = 512;

/// Host image batch: `[batch, height, width, 3]`, channels normalized to `0.0..=1.0`.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageTensor {
    data: Array4<f32>,
}

impl ImageTensor {
    pub fn new(data: Array4<f32>) -> Result<Self> {
        let (batch, height, width, channels) = data.dim();
        if channels != 3 {
            bail!("image tensor must have 3 channels, got {channels}");
        }
        if batch == 0 || height == 0 || width == 0 {
            bail!("image tensor is empty ({batch}x{height}x{width})");
        }
        Ok(Self { data })
    }

    pub fn zeros(batch: usize, height: usize, width: usize) -> Self {
        Self {
            data: Array4::zeros((batch.max(1), height.max(1), width.max(1), 3)),
        }
    }

    pub fn placeholder(count: usize) -> Self {
        Self::zeros(count, PLACEHOLDER_SIDE, PLACEHOLDER_SIDE)
    }

    pub fn batch(&self) -> usize {
        self.data.len_of(Axis(0))
    }

    pub fn height(&self) -> usize {
        self.data.len_of(Axis(1))
    }

    pub fn width(&self) -> usize {
        self.data.len_of(Axis(2))
    }

    pub fn data(&self) -> &Array4<f32> {
        &self.data
    }

    pub fn frame(&self, index: usize) -> Option<ArrayView3<'_, f32>> {
        if index >= self.batch() {
            return None;
        }
        Some(self.data.index_axis(Axis(0), index))
    }

    pub fn is_all_zero(&self) -> bool {
        self.data.iter().all(|value| *value == 0.0)
    }

    /// Stacks batches along the batch axis. Every part must share height and width.
    pub fn concat(parts: &[ImageTensor]) -> Result<Self> {
        if parts.is_empty() {
            bail!("cannot concatenate an empty list of image tensors");
        }
        let views = parts.iter().map(|part| part.data.view()).collect::<Vec<_>>();
        let data = ndarray::concatenate(Axis(0), &views)
            .context("image tensors differ in height or width")?;
        Ok(Self { data })
    }
}
