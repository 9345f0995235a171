//! page: одна отсканированная страница, хранящаяся на диске.
//!
//! На диске лежит базовое изображение + в журнале его transform. Пиксели файла
//! никогда не поворачиваются: каждый пересейв JPEG теряет качество, поэтому
//! поворот: это метаданные, применяемые только при чтении (materialize).
//!
//! Жизненный цикл: Active -> Disposed (терминальное). dispose() идемпотентен и
//! вызывается из Drop, кроме Drop во время паники.

use image::DynamicImage;
use log::{debug, error, warn};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::encoder::{decode, select_representation, BitDepth, CapturedImage, PageFormat};
use crate::error::{StoreError, StoreResult};
use crate::metrics;
use crate::orientation::Orientation;
use crate::session::{RecoveryContext, RecoverySession};
use crate::thumbnail::make_thumbnail;
use crate::util::payload_file_name;

pub struct ScannedPage {
    session: Arc<RecoverySession>,
    bit_depth: BitDepth,
    file_name: String,
    path: PathBuf,
    format: PageFormat,
    orientation: Orientation,
    thumbnail: Option<DynamicImage>,
    disposed: bool,
}

impl ScannedPage {
    /// Persist a captured image and register it in the run journal.
    ///
    /// Thumbnail comes from the raw capture before any lossy encoding. Any
    /// failure to acquire the session or to write the payload is returned:
    /// a page that is not on disk does not exist.
    pub fn create(
        ctx: &RecoveryContext,
        captured: CapturedImage,
        bit_depth: BitDepth,
        high_quality: bool,
    ) -> StoreResult<Self> {
        let thumbnail = {
            let raw = captured.raster()?;
            make_thumbnail(&raw, ctx.config().thumbnail_size)
        };

        let repr = select_representation(captured, bit_depth, high_quality, ctx.encoder_config())?;
        let passthrough = repr.is_encoded();
        let (bytes, format) = repr.into_bytes()?;

        loop {
            let session = ctx.acquire()?;
            let file_name = payload_file_name(ctx.next_file_seq(), format.extension());
            // None => сессию отпустили между acquire и записью, берём новую
            let Some(path) = session.persist_page(&file_name, &bytes)? else {
                continue;
            };
            metrics::record_page_created(bytes.len(), passthrough);
            debug!(
                "page {} created ({:?}, {:?}, {} bytes)",
                file_name,
                bit_depth,
                format,
                bytes.len()
            );
            return Ok(Self {
                session,
                bit_depth,
                file_name,
                path,
                format,
                orientation: Orientation::Deg0,
                thumbnail: Some(thumbnail),
                disposed: false,
            });
        }
    }

    /// Shorthand for `create` with an already decoded raster.
    pub fn from_raster(
        ctx: &RecoveryContext,
        img: DynamicImage,
        bit_depth: BitDepth,
        high_quality: bool,
    ) -> StoreResult<Self> {
        Self::create(ctx, CapturedImage::Raster(img), bit_depth, high_quality)
    }

    fn ensure_active(&self) -> StoreResult<()> {
        if self.disposed {
            return Err(StoreError::Disposed);
        }
        Ok(())
    }

    /// Decode the stored payload and apply the current orientation.
    /// The stored file is never modified.
    pub fn materialize(&self) -> StoreResult<DynamicImage> {
        self.ensure_active()?;
        let bytes = fs::read(&self.path).map_err(|source| StoreError::Io {
            path: self.path.clone(),
            source,
        })?;
        let img = decode(&bytes, self.format).map_err(|source| StoreError::Decode {
            path: self.path.clone(),
            source,
        })?;
        metrics::record_page_materialized();
        Ok(self.orientation.apply_owned(img))
    }

    /// Compose `angle` into the orientation, rotate the thumbnail in memory
    /// and update the journal entry. No payload I/O.
    pub fn rotate(&mut self, angle: Orientation) -> StoreResult<()> {
        self.ensure_active()?;
        let next = self.orientation.compose(angle);
        // сначала журнал: при ошибке записи память остаётся как на диске
        self.session.update_transform(&self.file_name, next)?;
        self.orientation = next;
        if let Some(thumb) = self.thumbnail.take() {
            self.thumbnail = Some(angle.apply_owned(thumb));
        }
        metrics::record_page_rotated();
        Ok(())
    }

    /// `rotate` for a raw angle in degrees; non-right angles are rejected.
    pub fn rotate_degrees(&mut self, degrees: i32) -> StoreResult<()> {
        let angle = Orientation::from_degrees(degrees).ok_or(StoreError::InvalidAngle(degrees))?;
        self.rotate(angle)
    }

    /// Delete the payload and its journal entry; release the session if this
    /// was its last page. Idempotent. Cleanup failures are logged only.
    pub fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        self.disposed = true;
        self.thumbnail = None;

        match fs::remove_file(&self.path) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!("page {} already gone from disk", self.file_name);
            }
            Err(e) => {
                error!(
                    "error cleaning up recovery file {}: {}",
                    self.path.display(),
                    e
                );
                metrics::record_cleanup_error();
                return;
            }
        }

        match self.session.unregister(&self.file_name) {
            Ok(released) => {
                metrics::record_page_disposed();
                if released {
                    debug!("page {} was the last one, session released", self.file_name);
                }
            }
            Err(e) => {
                error!(
                    "error removing {} from recovery journal: {}",
                    self.file_name, e
                );
                metrics::record_cleanup_error();
            }
        }
    }

    pub fn thumbnail(&self) -> Option<&DynamicImage> {
        self.thumbnail.as_ref()
    }

    pub fn orientation(&self) -> Orientation {
        self.orientation
    }

    pub fn bit_depth(&self) -> BitDepth {
        self.bit_depth
    }

    pub fn format(&self) -> PageFormat {
        self.format
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn session(&self) -> &Arc<RecoverySession> {
        &self.session
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }
}

impl Drop for ScannedPage {
    fn drop(&mut self) {
        // Раскрутка паники = прерванная сессия: файл и запись в журнале
        // остаются на диске для восстановления.
        if std::thread::panicking() {
            if !self.disposed {
                warn!("panic while page {} is live, keeping it for recovery", self.file_name);
            }
            return;
        }
        self.dispose();
    }
}

impl std::fmt::Debug for ScannedPage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScannedPage")
            .field("file_name", &self.file_name)
            .field("format", &self.format)
            .field("bit_depth", &self.bit_depth)
            .field("orientation", &self.orientation)
            .field("disposed", &self.disposed)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StoreConfig;
    use crate::util::random_hex;
    use image::{Rgb, RgbImage};

    fn ctx(tag: &str) -> RecoveryContext {
        let root = std::env::temp_dir().join(format!(
            "pk-page-{tag}-{}-{}",
            std::process::id(),
            random_hex(4)
        ));
        RecoveryContext::new(
            StoreConfig::default()
                .with_recovery_root(root)
                .with_thumbnail_size(8),
        )
    }

    fn sample() -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_fn(20, 10, |x, y| {
            Rgb([(x * 10) as u8, (y * 20) as u8, 128])
        }))
    }

    #[test]
    fn thumbnail_rotates_with_page() {
        let c = ctx("thumb");
        let mut p = ScannedPage::from_raster(&c, sample(), BitDepth::Color, true).unwrap();
        let t = p.thumbnail().unwrap();
        assert_eq!((t.width(), t.height()), (8, 4));

        p.rotate(Orientation::Deg90).unwrap();
        let t = p.thumbnail().unwrap();
        assert_eq!((t.width(), t.height()), (4, 8));
        assert_eq!(p.orientation(), Orientation::Deg90);
        p.dispose();
        assert!(p.thumbnail().is_none());
    }

    #[test]
    fn operations_after_dispose() {
        let c = ctx("disposed");
        let mut p = ScannedPage::from_raster(&c, sample(), BitDepth::Grayscale, false).unwrap();
        p.dispose();
        p.dispose();
        assert!(p.is_disposed());
        assert!(matches!(p.materialize(), Err(StoreError::Disposed)));
        assert!(matches!(p.rotate(Orientation::Deg90), Err(StoreError::Disposed)));
    }

    #[test]
    fn rotate_degrees_rejects_odd_angles() {
        let c = ctx("angle");
        let mut p = ScannedPage::from_raster(&c, sample(), BitDepth::Color, false).unwrap();
        assert!(matches!(p.rotate_degrees(45), Err(StoreError::InvalidAngle(45))));
        p.rotate_degrees(-90).unwrap();
        assert_eq!(p.orientation(), Orientation::Deg270);
    }
}
