//! Label bitmaps and their persistent atlas copy.
//!
//! Workers rasterize one fixed-size bitmap per star label through the
//! [`LabelRasterizer`] seam (the real text renderer lives with the UI). On
//! merge, the bitmaps are copied into a [`LabelAtlas`] owned by the
//! residency set, and the originals become disposable via the cleanup queue.

use image::RgbaImage;

/// Renders fixed-size label bitmaps for a batch of strings.
///
/// Implementations must be callable from multiple workers at once.
pub trait LabelRasterizer: Send + Sync {
    /// Render the first `count` labels into `width` x `height` RGBA bitmaps.
    ///
    /// `labels` may be longer than `count`; only the first `count` entries
    /// are valid.
    fn rasterize(&self, labels: &[String], count: usize, width: u32, height: u32)
        -> Vec<RgbaImage>;
}

/// Rasterizer stand-in for headless runs and tests.
///
/// Emits blank bitmaps of the requested size; the embedding UI supplies the
/// real text renderer.
#[derive(Debug, Default, Clone, Copy)]
pub struct PlaceholderRasterizer;

impl LabelRasterizer for PlaceholderRasterizer {
    fn rasterize(
        &self,
        labels: &[String],
        count: usize,
        width: u32,
        height: u32,
    ) -> Vec<RgbaImage> {
        let n = count.min(labels.len());
        (0..n).map(|_| RgbaImage::new(width, height)).collect()
    }
}

/// Contiguous copy of a sector's label bitmaps.
///
/// Layer-major layout, one layer per label, mirroring a GPU texture array
/// upload. Owning the pixels here is what lets the per-sector originals be
/// disposed off the hot path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelAtlas {
    width: u32,
    height: u32,
    layers: usize,
    pixels: Vec<u8>,
}

impl LabelAtlas {
    /// Copies `images` into a fresh atlas.
    ///
    /// All images must share the rasterizer's fixed size; shorter or absent
    /// batches produce an empty atlas.
    pub fn from_images(images: &[RgbaImage]) -> Self {
        let (width, height) = images
            .first()
            .map(|img| (img.width(), img.height()))
            .unwrap_or((0, 0));
        let mut pixels = Vec::with_capacity(images.len() * (width * height * 4) as usize);
        for img in images {
            debug_assert_eq!((img.width(), img.height()), (width, height));
            pixels.extend_from_slice(img.as_raw());
        }
        Self {
            width,
            height,
            layers: images.len(),
            pixels,
        }
    }

    /// Atlas with no layers.
    pub fn empty() -> Self {
        Self {
            width: 0,
            height: 0,
            layers: 0,
            pixels: Vec::new(),
        }
    }

    /// Number of label layers held.
    pub fn layers(&self) -> usize {
        self.layers
    }

    /// Bitmap dimensions shared by every layer.
    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Raw RGBA bytes of one layer, if present.
    pub fn layer(&self, index: usize) -> Option<&[u8]> {
        if index >= self.layers {
            return None;
        }
        let stride = (self.width * self.height * 4) as usize;
        Some(&self.pixels[index * stride..(index + 1) * stride])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_placeholder_respects_count() {
        let labels = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        let images = PlaceholderRasterizer.rasterize(&labels, 2, 160, 16);
        assert_eq!(images.len(), 2);
        assert_eq!(images[0].dimensions(), (160, 16));
    }

    #[test]
    fn test_atlas_copies_pixels() {
        let mut a = RgbaImage::new(2, 1);
        a.get_pixel_mut(0, 0).0 = [1, 2, 3, 4];
        let mut b = RgbaImage::new(2, 1);
        b.get_pixel_mut(1, 0).0 = [9, 8, 7, 6];

        let atlas = LabelAtlas::from_images(&[a, b]);
        assert_eq!(atlas.layers(), 2);
        assert_eq!(atlas.dimensions(), (2, 1));
        assert_eq!(atlas.layer(0).unwrap(), &[1, 2, 3, 4, 0, 0, 0, 0]);
        assert_eq!(atlas.layer(1).unwrap(), &[0, 0, 0, 0, 9, 8, 7, 6]);
        assert!(atlas.layer(2).is_none());
    }

    #[test]
    fn test_empty_atlas() {
        let atlas = LabelAtlas::empty();
        assert_eq!(atlas.layers(), 0);
        assert!(atlas.layer(0).is_none());
        assert_eq!(LabelAtlas::from_images(&[]), atlas);
    }
}
