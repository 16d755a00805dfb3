//! Depth capture assembly
//!
//! One cycle of a time-of-flight camera (per-pixel XYZ, confidence and
//! amplitude) becomes a composite frame holding a confidence-masked point
//! grid, an amplitude grayscale image and its RGB broadcast.

use contracts::{ListenerError, Result};
use frames::{CompositeFrame, DataFrame, Tensor, TypedFrame};
use listener::SourceContext;

/// Raw per-cycle output of a depth camera, row-major
#[derive(Debug, Clone)]
pub struct DepthCapture {
    pub rows: usize,
    pub cols: usize,
    pub xyz: Vec<[f32; 3]>,
    /// Non-zero where the depth measurement is trusted
    pub confidence: Vec<u8>,
    pub amplitude: Vec<f32>,
    pub timestamp_us: i64,
}

impl DepthCapture {
    fn check_lengths(&self) -> Result<()> {
        let pixels = self.rows * self.cols;
        if self.xyz.len() != pixels || self.confidence.len() != pixels || self.amplitude.len() != pixels {
            return Err(ListenerError::invalid_argument(format!(
                "depth capture {}x{} has {} points, {} confidences, {} amplitudes",
                self.rows,
                self.cols,
                self.xyz.len(),
                self.confidence.len(),
                self.amplitude.len()
            )));
        }
        Ok(())
    }

    /// Assemble the composite frame and apply the listener's resize
    pub fn into_composite(self, ctx: &SourceContext) -> Result<CompositeFrame> {
        self.check_lengths()?;

        let grid_data = self
            .xyz
            .iter()
            .zip(&self.confidence)
            .flat_map(|(p, &c)| if c != 0 { *p } else { [0.0; 3] })
            .collect();
        let grid = Tensor::from_vec(self.rows, self.cols, 3, grid_data)?;

        let amplitude = Tensor::from_vec(self.rows, self.cols, 1, self.amplitude)?;
        let gray = scale_to_gray(&amplitude);
        let rgb = gray.broadcast_channels(3)?;

        let mut composite = CompositeFrame::new(self.timestamp_us, ctx.sensor.rgb_mappable());
        composite.add_frame(DataFrame::point_grid(TypedFrame::new(grid, ctx.frame.clone()))?)?;
        composite.add_frame(DataFrame::grayscale(TypedFrame::new(gray, ctx.frame.clone()))?)?;
        composite.add_frame(DataFrame::rgb(TypedFrame::new(rgb, ctx.frame.clone()))?)?;
        composite.resize_all(ctx.resize_factor)?;
        Ok(composite)
    }
}

/// Map a single-channel plane onto `0..=255` by its maximum (a zero maximum counts as 1)
pub fn scale_to_gray(plane: &Tensor<f32>) -> Tensor<u8> {
    let max = plane.as_slice().iter().copied().fold(0.0f32, f32::max);
    let max = if max == 0.0 { 1.0 } else { max };
    let mut gray = Tensor::zeros(plane.rows(), plane.cols(), plane.channels());
    for (dst, src) in gray.as_mut_slice().iter_mut().zip(plane.as_slice()) {
        *dst = (src * 255.0 / max) as u8;
    }
    gray
}
