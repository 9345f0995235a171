// Базовые модули
pub mod consts;
pub mod config;
pub mod error;
pub mod metrics;
pub mod util;

// Представление страницы: поворот, кодирование, превью
pub mod orientation;
pub mod encoder;
pub mod thumbnail;

// Диск: lock, журнал, сессия, страница
pub mod lock;
pub mod journal;
pub mod session;
pub mod page;

// Разбор брошенных run-каталогов
pub mod recover;

// Удобные реэкспорты
pub use config::{StoreBuilder, StoreConfig};
pub use encoder::{BitDepth, CapturedImage, PageFormat, Representation};
pub use error::{StoreError, StoreResult};
pub use journal::{IndexEntry, RecoveryIndex};
pub use orientation::Orientation;
pub use page::ScannedPage;
pub use recover::{purge_stale, scan_root, RecoverableRun, RecoveredPage};
pub use session::{RecoveryContext, RecoverySession};
