//! Thumbnails are always cut from the raw capture, before any lossy encoding.

use image::DynamicImage;

/// Scale `img` so that its longer side is at most `max_side`, keeping the
/// aspect ratio. Smaller images are copied as-is.
pub fn make_thumbnail(img: &DynamicImage, max_side: u32) -> DynamicImage {
    let max_side = max_side.max(1);
    if img.width() <= max_side && img.height() <= max_side {
        return img.clone();
    }
    img.thumbnail(max_side, max_side)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbImage;

    #[test]
    fn keeps_aspect_ratio() {
        let img = DynamicImage::ImageRgb8(RgbImage::new(400, 200));
        let t = make_thumbnail(&img, 100);
        assert_eq!(t.width(), 100);
        assert_eq!(t.height(), 50);
    }

    #[test]
    fn small_images_untouched() {
        let img = DynamicImage::ImageRgb8(RgbImage::new(30, 20));
        let t = make_thumbnail(&img, 100);
        assert_eq!((t.width(), t.height()), (30, 20));
    }
}
