//! Unorganized point-cloud output of a composite frame.

use nalgebra::Vector3;

/// Receiver of the points produced by [`CompositeFrame::to_point_cloud`].
///
/// [`CompositeFrame::to_point_cloud`]: crate::CompositeFrame::to_point_cloud
pub trait PointSink {
    /// Drop everything previously pushed
    fn clear(&mut self);

    /// Append one point, with its color when the source is RGB-mappable
    fn push(&mut self, point: Vector3<f32>, color: Option<[u8; 3]>);
}

/// Flat point list with optional index-aligned colors
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PointCloud {
    pub points: Vec<Vector3<f32>>,
    pub colors: Vec<[u8; 3]>,
}

impl PointCloud {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn has_colors(&self) -> bool {
        !self.colors.is_empty()
    }
}

impl PointSink for PointCloud {
    fn clear(&mut self) {
        self.points.clear();
        self.colors.clear();
    }

    fn push(&mut self, point: Vector3<f32>, color: Option<[u8; 3]>) {
        self.points.push(point);
        if let Some(color) = color {
            self.colors.push(color);
        }
    }
}
