//! Dense row-major `(rows, cols, channels)` storage.

use contracts::{ListenerError, Result};

/// Element types a frame tensor can hold
pub trait Element: Copy + Default + PartialEq + Send + Sync + 'static {
    /// Whether this value counts as data (as opposed to an empty cell)
    fn is_nonzero(&self) -> bool;
}

impl Element for f32 {
    #[inline]
    fn is_nonzero(&self) -> bool {
        *self != 0.0
    }
}

impl Element for u8 {
    #[inline]
    fn is_nonzero(&self) -> bool {
        *self != 0
    }
}

impl Element for bool {
    #[inline]
    fn is_nonzero(&self) -> bool {
        *self
    }
}

/// Three dimensional tensor indexed as `(row, col, channel)`
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Tensor<T> {
    rows: usize,
    cols: usize,
    channels: usize,
    data: Vec<T>,
}

impl<T: Element> Tensor<T> {
    /// Tensor filled with `T::default()`
    pub fn zeros(rows: usize, cols: usize, channels: usize) -> Self {
        Self {
            rows,
            cols,
            channels,
            data: vec![T::default(); rows * cols * channels],
        }
    }

    /// Wrap row-major data, checking its length against the shape
    pub fn from_vec(rows: usize, cols: usize, channels: usize, data: Vec<T>) -> Result<Self> {
        let expected = rows * cols * channels;
        if data.len() != expected {
            return Err(ListenerError::invalid_argument(format!(
                "tensor of shape ({rows}, {cols}, {channels}) needs {expected} elements, got {}",
                data.len()
            )));
        }
        Ok(Self {
            rows,
            cols,
            channels,
            data,
        })
    }

    /// Zero-sized placeholder
    pub fn empty() -> Self {
        Self::zeros(0, 0, 0)
    }

    #[inline]
    pub fn rows(&self) -> usize {
        self.rows
    }

    #[inline]
    pub fn cols(&self) -> usize {
        self.cols
    }

    #[inline]
    pub fn channels(&self) -> usize {
        self.channels
    }

    /// `(rows, cols, channels)`
    #[inline]
    pub fn dims(&self) -> (usize, usize, usize) {
        (self.rows, self.cols, self.channels)
    }

    /// True for the `(0, 0, 0)` placeholder
    pub fn is_unallocated(&self) -> bool {
        self.rows == 0 && self.cols == 0 && self.channels == 0
    }

    #[inline]
    fn offset(&self, row: usize, col: usize, channel: usize) -> usize {
        (row * self.cols + col) * self.channels + channel
    }

    /// Element at `(row, col, channel)`, `None` when out of bounds
    pub fn get(&self, row: usize, col: usize, channel: usize) -> Option<T> {
        if row < self.rows && col < self.cols && channel < self.channels {
            Some(self.data[self.offset(row, col, channel)])
        } else {
            None
        }
    }

    /// Overwrite one element; out-of-bounds writes are ignored and reported
    pub fn set(&mut self, row: usize, col: usize, channel: usize, value: T) -> bool {
        if row < self.rows && col < self.cols && channel < self.channels {
            let idx = self.offset(row, col, channel);
            self.data[idx] = value;
            true
        } else {
            false
        }
    }

    /// All channels of one pixel
    pub fn pixel(&self, row: usize, col: usize) -> Option<&[T]> {
        if row < self.rows && col < self.cols {
            let start = self.offset(row, col, 0);
            Some(&self.data[start..start + self.channels])
        } else {
            None
        }
    }

    /// Mutable view of all channels of one pixel
    pub fn pixel_mut(&mut self, row: usize, col: usize) -> Option<&mut [T]> {
        if row < self.rows && col < self.cols {
            let start = self.offset(row, col, 0);
            let channels = self.channels;
            Some(&mut self.data[start..start + channels])
        } else {
            None
        }
    }

    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    pub fn as_mut_slice(&mut self) -> &mut [T] {
        &mut self.data
    }

    pub fn into_vec(self) -> Vec<T> {
        self.data
    }

    /// Single channel boolean tensor, true where any channel is non-zero
    pub fn nonzero_mask(&self) -> Tensor<bool> {
        let data = if self.channels == 0 {
            vec![false; self.rows * self.cols]
        } else {
            self.data
                .chunks_exact(self.channels)
                .map(|px| px.iter().any(Element::is_nonzero))
                .collect()
        };
        Tensor {
            rows: self.rows,
            cols: self.cols,
            channels: 1,
            data,
        }
    }

    /// Extract one channel as a single channel tensor
    pub fn channel(&self, channel: usize) -> Result<Tensor<T>> {
        if channel >= self.channels {
            return Err(ListenerError::invalid_argument(format!(
                "channel {channel} out of range for {} channels",
                self.channels
            )));
        }
        let data = self
            .data
            .chunks_exact(self.channels)
            .map(|px| px[channel])
            .collect();
        Ok(Tensor {
            rows: self.rows,
            cols: self.cols,
            channels: 1,
            data,
        })
    }

    /// Repeat a single channel tensor across `channels` channels
    pub fn broadcast_channels(&self, channels: usize) -> Result<Tensor<T>> {
        if self.channels != 1 {
            return Err(ListenerError::invalid_argument(format!(
                "can only broadcast a single channel tensor, got {} channels",
                self.channels
            )));
        }
        let data = self
            .data
            .iter()
            .flat_map(|&v| std::iter::repeat_n(v, channels))
            .collect();
        Ok(Tensor {
            rows: self.rows,
            cols: self.cols,
            channels,
            data,
        })
    }

    /// Nearest-neighbour resample to `round(rows * factor) × round(cols * factor)`.
    ///
    /// Destination pixel `d` samples source pixel `min(floor(d / factor), n - 1)`,
    /// so no value is ever interpolated.
    pub fn resized_nearest(&self, factor: f32) -> Result<Tensor<T>> {
        if !factor.is_finite() || factor <= 0.0 {
            return Err(ListenerError::invalid_argument(format!(
                "resize factor must be positive and finite, got {factor}"
            )));
        }
        if factor == 1.0 {
            return Ok(self.clone());
        }

        let new_rows = scaled_extent(self.rows, factor);
        let new_cols = scaled_extent(self.cols, factor);
        let inv = 1.0 / f64::from(factor);
        let src_index = |dst: usize, extent: usize| -> usize {
            let src = (dst as f64 * inv).floor() as usize;
            src.min(extent.saturating_sub(1))
        };

        let mut out = Tensor::zeros(new_rows, new_cols, self.channels);
        if self.rows == 0 || self.cols == 0 {
            return Ok(out);
        }
        let col_map: Vec<usize> = (0..new_cols).map(|c| src_index(c, self.cols)).collect();
        for row in 0..new_rows {
            let src_row = src_index(row, self.rows);
            for (col, &src_col) in col_map.iter().enumerate() {
                let from = self.offset(src_row, src_col, 0);
                let to = out.offset(row, col, 0);
                out.data[to..to + self.channels]
                    .copy_from_slice(&self.data[from..from + self.channels]);
            }
        }
        Ok(out)
    }
}

#[inline]
fn scaled_extent(extent: usize, factor: f32) -> usize {
    (extent as f64 * f64::from(factor)).round() as usize
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp(rows: usize, cols: usize, channels: usize) -> Tensor<f32> {
        let data = (0..rows * cols * channels).map(|v| v as f32).collect();
        Tensor::from_vec(rows, cols, channels, data).unwrap()
    }

    #[test]
    fn test_from_vec_checks_length() {
        assert!(Tensor::<u8>::from_vec(2, 2, 1, vec![0; 3]).is_err());
        assert!(Tensor::<u8>::from_vec(2, 2, 1, vec![0; 4]).is_ok());
    }

    #[test]
    fn test_row_major_layout() {
        let t = ramp(2, 3, 2);
        assert_eq!(t.get(0, 1, 0), Some(2.0));
        assert_eq!(t.get(1, 0, 1), Some(7.0));
        assert_eq!(t.pixel(1, 2), Some(&[10.0, 11.0][..]));
        assert_eq!(t.get(2, 0, 0), None);
    }

    #[test]
    fn test_resize_identity_is_noop() {
        let t = ramp(4, 5, 3);
        assert_eq!(t.resized_nearest(1.0).unwrap(), t);
    }

    #[test]
    fn test_resize_down_picks_source_pixels() {
        let t = ramp(4, 4, 1);
        let half = t.resized_nearest(0.5).unwrap();
        assert_eq!(half.dims(), (2, 2, 1));
        assert_eq!(half.as_slice(), &[0.0, 2.0, 8.0, 10.0]);
    }

    #[test]
    fn test_resize_up_duplicates_without_smoothing() {
        let t = Tensor::from_vec(1, 2, 1, vec![0u8, 255]).unwrap();
        let up = t.resized_nearest(2.0).unwrap();
        assert_eq!(up.dims(), (2, 4, 1));
        assert_eq!(up.as_slice(), &[0, 0, 255, 255, 0, 0, 255, 255]);
    }

    #[test]
    fn test_resize_round_trip_restores_dimensions() {
        let t = ramp(36, 100, 3);
        let back = t
            .resized_nearest(0.25)
            .unwrap()
            .resized_nearest(4.0)
            .unwrap();
        assert_eq!(back.dims(), t.dims());
    }

    #[test]
    fn test_resize_rejects_bad_factor() {
        let t = ramp(2, 2, 1);
        assert!(t.resized_nearest(0.0).is_err());
        assert!(t.resized_nearest(-1.0).is_err());
        assert!(t.resized_nearest(f32::NAN).is_err());
    }

    #[test]
    fn test_nonzero_mask_any_channel() {
        let t = Tensor::from_vec(1, 3, 3, vec![0.0, 0.0, 0.0, 0.0, 2.0, 0.0, -1.0, 0.0, 0.0])
            .unwrap();
        let mask = t.nonzero_mask();
        assert_eq!(mask.dims(), (1, 3, 1));
        assert_eq!(mask.as_slice(), &[false, true, true]);
    }

    #[test]
    fn test_channel_and_broadcast() {
        let t = ramp(1, 2, 3);
        let z = t.channel(2).unwrap();
        assert_eq!(z.as_slice(), &[2.0, 5.0]);
        let rgb = z.broadcast_channels(3).unwrap();
        assert_eq!(rgb.as_slice(), &[2.0, 2.0, 2.0, 5.0, 5.0, 5.0]);
        assert!(t.broadcast_channels(3).is_err());
    }
}
