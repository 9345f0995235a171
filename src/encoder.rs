//! encoder: выбор представления страницы на диске.
//!
//! Политика:
//! - BlackWhite  -> всегда PNG (бинаризованный растр). Артефакты JPEG на
//!   ч/б контенте неприемлемы, а PNG для двух уровней и так минимален.
//! - Gray/Color + high_quality -> PNG.
//! - Gray/Color иначе -> JPEG(quality), либо (pick_smallest) меньший из PNG/JPEG.
//!
//! Если источник уже отдал закодированные байты в приемлемом формате, они
//! пишутся как есть (EncodedBytes): повторный decode/encode только ухудшает
//! lossy-формат.

use std::borrow::Cow;
use std::io::Cursor;

use image::codecs::jpeg::JpegEncoder;
use image::{ColorType, DynamicImage, GrayImage, ImageError, ImageFormat, Luma};
use serde::{Deserialize, Serialize};

use crate::config::StoreConfig;
use crate::consts::{BILEVEL_THRESHOLD, DEFAULT_JPEG_QUALITY};

/// Bit-depth classification reported by the capture pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BitDepth {
    BlackWhite,
    Grayscale,
    Color,
}

impl BitDepth {
    pub fn is_bilevel(self) -> bool {
        matches!(self, BitDepth::BlackWhite)
    }
}

/// On-disk encoding of a page payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PageFormat {
    Png,
    Jpeg,
}

impl PageFormat {
    pub fn extension(self) -> &'static str {
        match self {
            PageFormat::Png => "png",
            PageFormat::Jpeg => "jpg",
        }
    }

    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "png" => Some(PageFormat::Png),
            "jpg" | "jpeg" => Some(PageFormat::Jpeg),
            _ => None,
        }
    }

    pub fn is_lossless(self) -> bool {
        matches!(self, PageFormat::Png)
    }

    pub fn image_format(self) -> ImageFormat {
        match self {
            PageFormat::Png => ImageFormat::Png,
            PageFormat::Jpeg => ImageFormat::Jpeg,
        }
    }
}

/// What the capture pipeline hands over.
#[derive(Debug, Clone)]
pub enum CapturedImage {
    Raster(DynamicImage),
    /// Bytes already encoded by the source (e.g. a scanner delivering JPEG).
    Encoded { bytes: Vec<u8>, format: PageFormat },
}

impl CapturedImage {
    /// Decoded view of the capture (borrowed for rasters, decoded for bytes).
    pub fn raster(&self) -> Result<Cow<'_, DynamicImage>, ImageError> {
        match self {
            CapturedImage::Raster(img) => Ok(Cow::Borrowed(img)),
            CapturedImage::Encoded { bytes, format } => Ok(Cow::Owned(decode(bytes, *format)?)),
        }
    }
}

/// Exactly one of: a raster that still has to be encoded, or ready bytes.
#[derive(Debug, Clone)]
pub enum Representation {
    PendingRaster {
        raster: DynamicImage,
        format: PageFormat,
        quality: u8,
    },
    EncodedBytes {
        bytes: Vec<u8>,
        format: PageFormat,
    },
}

impl Representation {
    pub fn format(&self) -> PageFormat {
        match self {
            Representation::PendingRaster { format, .. } => *format,
            Representation::EncodedBytes { format, .. } => *format,
        }
    }

    pub fn is_encoded(&self) -> bool {
        matches!(self, Representation::EncodedBytes { .. })
    }

    /// Encode if still pending; encoded bytes pass through untouched.
    pub fn into_bytes(self) -> Result<(Vec<u8>, PageFormat), ImageError> {
        match self {
            Representation::PendingRaster {
                raster,
                format,
                quality,
            } => Ok((encode(&raster, format, quality)?, format)),
            Representation::EncodedBytes { bytes, format } => Ok((bytes, format)),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct EncoderConfig {
    pub jpeg_quality: u8,
    pub pick_smallest: bool,
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            jpeg_quality: DEFAULT_JPEG_QUALITY,
            pick_smallest: false,
        }
    }
}

impl From<&StoreConfig> for EncoderConfig {
    fn from(cfg: &StoreConfig) -> Self {
        Self {
            jpeg_quality: cfg.jpeg_quality,
            pick_smallest: cfg.pick_smallest,
        }
    }
}

/// Pick the persisted representation for a capture.
pub fn select_representation(
    captured: CapturedImage,
    bit_depth: BitDepth,
    high_quality: bool,
    cfg: &EncoderConfig,
) -> Result<Representation, ImageError> {
    let quality = cfg.jpeg_quality.clamp(1, 100);

    if bit_depth.is_bilevel() {
        return Ok(match captured {
            CapturedImage::Encoded {
                bytes,
                format: PageFormat::Png,
            } => Representation::EncodedBytes {
                bytes,
                format: PageFormat::Png,
            },
            other => Representation::PendingRaster {
                raster: to_bilevel(other.raster()?.as_ref()),
                format: PageFormat::Png,
                quality,
            },
        });
    }

    match captured {
        // JPEG от источника пишем как есть и при high_quality: повторное
        // кодирование в PNG качество уже не вернёт.
        CapturedImage::Encoded {
            bytes,
            format: PageFormat::Jpeg,
        } => Ok(Representation::EncodedBytes {
            bytes,
            format: PageFormat::Jpeg,
        }),
        CapturedImage::Encoded {
            bytes,
            format: PageFormat::Png,
        } => {
            if high_quality {
                return Ok(Representation::EncodedBytes {
                    bytes,
                    format: PageFormat::Png,
                });
            }
            let raster = decode(&bytes, PageFormat::Png)?;
            if cfg.pick_smallest {
                let jpeg = encode(&raster, PageFormat::Jpeg, quality)?;
                return Ok(smaller_of(bytes, jpeg));
            }
            Ok(Representation::PendingRaster {
                raster,
                format: PageFormat::Jpeg,
                quality,
            })
        }
        CapturedImage::Raster(raster) => {
            if high_quality {
                return Ok(Representation::PendingRaster {
                    raster,
                    format: PageFormat::Png,
                    quality,
                });
            }
            if cfg.pick_smallest {
                let png = encode(&raster, PageFormat::Png, quality)?;
                let jpeg = encode(&raster, PageFormat::Jpeg, quality)?;
                return Ok(smaller_of(png, jpeg));
            }
            Ok(Representation::PendingRaster {
                raster,
                format: PageFormat::Jpeg,
                quality,
            })
        }
    }
}

fn smaller_of(png: Vec<u8>, jpeg: Vec<u8>) -> Representation {
    if png.len() <= jpeg.len() {
        Representation::EncodedBytes {
            bytes: png,
            format: PageFormat::Png,
        }
    } else {
        Representation::EncodedBytes {
            bytes: jpeg,
            format: PageFormat::Jpeg,
        }
    }
}

/// Threshold to two levels (0/255) in an 8-bit gray raster.
pub fn to_bilevel(img: &DynamicImage) -> DynamicImage {
    let gray = img.to_luma8();
    let (w, h) = gray.dimensions();
    let out = GrayImage::from_fn(w, h, |x, y| {
        if gray.get_pixel(x, y)[0] >= BILEVEL_THRESHOLD {
            Luma([255])
        } else {
            Luma([0])
        }
    });
    DynamicImage::ImageLuma8(out)
}

pub fn encode(img: &DynamicImage, format: PageFormat, quality: u8) -> Result<Vec<u8>, ImageError> {
    let mut buf = Vec::new();
    match format {
        PageFormat::Png => {
            img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)?;
        }
        PageFormat::Jpeg => {
            // JPEG не умеет альфу и 16 бит
            let compatible = jpeg_compatible(img);
            let enc = JpegEncoder::new_with_quality(&mut buf, quality.clamp(1, 100));
            compatible.write_with_encoder(enc)?;
        }
    }
    Ok(buf)
}

pub fn decode(bytes: &[u8], format: PageFormat) -> Result<DynamicImage, ImageError> {
    image::load_from_memory_with_format(bytes, format.image_format())
}

fn jpeg_compatible(img: &DynamicImage) -> Cow<'_, DynamicImage> {
    match img.color() {
        ColorType::L8 | ColorType::Rgb8 => Cow::Borrowed(img),
        ColorType::La8 | ColorType::L16 | ColorType::La16 => {
            Cow::Owned(DynamicImage::ImageLuma8(img.to_luma8()))
        }
        _ => Cow::Owned(DynamicImage::ImageRgb8(img.to_rgb8())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    fn gradient(w: u32, h: u32) -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_fn(w, h, |x, y| {
            Rgb([(x * 7 % 256) as u8, (y * 13 % 256) as u8, ((x + y) % 256) as u8])
        }))
    }

    #[test]
    fn bilevel_is_always_lossless() {
        let cfg = EncoderConfig::default();
        for hq in [false, true] {
            let r = select_representation(
                CapturedImage::Raster(gradient(16, 16)),
                BitDepth::BlackWhite,
                hq,
                &cfg,
            )
            .unwrap();
            assert_eq!(r.format(), PageFormat::Png);
            match r {
                Representation::PendingRaster { raster, .. } => {
                    let g = raster.to_luma8();
                    assert!(g.pixels().all(|p| p[0] == 0 || p[0] == 255));
                }
                Representation::EncodedBytes { .. } => panic!("raster input must stay pending"),
            }
        }
    }

    #[test]
    fn bilevel_from_encoded_jpeg_is_thresholded_png() {
        let jpeg = encode(&gradient(16, 16), PageFormat::Jpeg, 90).unwrap();
        let r = select_representation(
            CapturedImage::Encoded {
                bytes: jpeg,
                format: PageFormat::Jpeg,
            },
            BitDepth::BlackWhite,
            false,
            &EncoderConfig::default(),
        )
        .unwrap();
        assert_eq!(r.format(), PageFormat::Png);
        assert!(!r.is_encoded());
        let (bytes, _) = r.into_bytes().unwrap();
        let back = decode(&bytes, PageFormat::Png).unwrap().to_luma8();
        assert!(back.pixels().all(|p| p[0] == 0 || p[0] == 255));
    }

    #[test]
    fn color_follows_quality_flag() {
        let cfg = EncoderConfig::default();
        let low = select_representation(
            CapturedImage::Raster(gradient(8, 8)),
            BitDepth::Color,
            false,
            &cfg,
        )
        .unwrap();
        assert_eq!(low.format(), PageFormat::Jpeg);

        let high = select_representation(
            CapturedImage::Raster(gradient(8, 8)),
            BitDepth::Color,
            true,
            &cfg,
        )
        .unwrap();
        assert_eq!(high.format(), PageFormat::Png);
    }

    #[test]
    fn encoded_jpeg_passes_through_verbatim() {
        let jpeg = encode(&gradient(8, 8), PageFormat::Jpeg, 50).unwrap();
        let r = select_representation(
            CapturedImage::Encoded {
                bytes: jpeg.clone(),
                format: PageFormat::Jpeg,
            },
            BitDepth::Grayscale,
            false,
            &EncoderConfig::default(),
        )
        .unwrap();
        assert!(r.is_encoded());
        let (bytes, fmt) = r.into_bytes().unwrap();
        assert_eq!(fmt, PageFormat::Jpeg);
        assert_eq!(bytes, jpeg);
    }

    #[test]
    fn pick_smallest_returns_encoded_bytes() {
        let cfg = EncoderConfig {
            jpeg_quality: 75,
            pick_smallest: true,
        };
        // Однотонная картинка: PNG заведомо меньше
        let flat = DynamicImage::ImageRgb8(RgbImage::from_pixel(64, 64, Rgb([10, 20, 30])));
        let r = select_representation(CapturedImage::Raster(flat), BitDepth::Color, false, &cfg)
            .unwrap();
        assert!(r.is_encoded());
        assert_eq!(r.format(), PageFormat::Png);
    }

    #[test]
    fn png_roundtrip_is_lossless() {
        let img = gradient(12, 9);
        let bytes = encode(&img, PageFormat::Png, 75).unwrap();
        let back = decode(&bytes, PageFormat::Png).unwrap();
        assert_eq!(back.to_rgb8(), img.to_rgb8());
    }

    #[test]
    fn extension_mapping() {
        assert_eq!(PageFormat::from_extension("JPG"), Some(PageFormat::Jpeg));
        assert_eq!(PageFormat::from_extension("png"), Some(PageFormat::Png));
        assert_eq!(PageFormat::from_extension("tif"), None);
        assert_eq!(PageFormat::Jpeg.extension(), "jpg");
    }
}
