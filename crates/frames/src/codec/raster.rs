//! 8-bit raster images (grayscale and RGB) through the `image` crate.

use std::path::Path;

use image::{ColorType, DynamicImage};

use crate::tensor::Tensor;
use contracts::{ListenerError, Result};

fn color_type(channels: usize) -> Result<ColorType> {
    match channels {
        1 => Ok(ColorType::L8),
        3 => Ok(ColorType::Rgb8),
        other => Err(ListenerError::invalid_argument(format!(
            "cannot encode a {other} channel raster"
        ))),
    }
}

/// Save a 1 or 3 channel tensor; the encoding follows the extension of `path`
pub fn save(path: &Path, tensor: &Tensor<u8>) -> Result<()> {
    let color = color_type(tensor.channels())?;
    let width = u32::try_from(tensor.cols())
        .map_err(|_| ListenerError::invalid_argument("raster too wide"))?;
    let height = u32::try_from(tensor.rows())
        .map_err(|_| ListenerError::invalid_argument("raster too tall"))?;
    image::save_buffer(path, tensor.as_slice(), width, height, color)
        .map_err(|e| ListenerError::format(path.display().to_string(), e.to_string()))
}

/// Load a raster, converting it to `channels` (1 or 3) 8-bit channels
pub fn load(path: &Path, channels: usize) -> Result<Tensor<u8>> {
    color_type(channels)?;
    let decoded: DynamicImage = image::open(path)
        .map_err(|e| ListenerError::format(path.display().to_string(), e.to_string()))?;
    let (width, height, data) = if channels == 1 {
        let gray = decoded.into_luma8();
        (gray.width(), gray.height(), gray.into_raw())
    } else {
        let rgb = decoded.into_rgb8();
        (rgb.width(), rgb.height(), rgb.into_raw())
    };
    Tensor::from_vec(height as usize, width as usize, channels, data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_png_gray_and_rgb() {
        let dir = tempdir().unwrap();

        let gray = Tensor::from_vec(2, 3, 1, vec![0, 50, 100, 150, 200, 250]).unwrap();
        let gray_path = dir.path().join("gray.png");
        save(&gray_path, &gray).unwrap();
        assert_eq!(load(&gray_path, 1).unwrap(), gray);

        let rgb = Tensor::from_vec(1, 2, 3, vec![255, 0, 0, 0, 0, 255]).unwrap();
        let rgb_path = dir.path().join("rgb.png");
        save(&rgb_path, &rgb).unwrap();
        assert_eq!(load(&rgb_path, 3).unwrap(), rgb);
    }

    #[test]
    fn test_gray_file_loads_as_rgb() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("gray.png");
        save(&path, &Tensor::from_vec(1, 1, 1, vec![42]).unwrap()).unwrap();
        assert_eq!(load(&path, 3).unwrap().as_slice(), &[42, 42, 42]);
    }

    #[test]
    fn test_unreadable_file_is_format_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("broken.png");
        std::fs::write(&path, b"garbage").unwrap();
        assert!(matches!(load(&path, 1), Err(ListenerError::Format { .. })));
    }
}
