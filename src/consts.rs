//! Общие константы раскладки recovery-каталога.
//!
//! <recovery_root>/<run>/
//!   .lock       : sentinel (create_new) + fs2 exclusive lock, пока сессия жива
//!   index.json  : журнал {file_name, transform} в порядке создания
//!   00001.png   : payload-файлы: 5-значный счётчик + расширение формата
//!   00002.jpg

// -------- Run folder --------
pub const LOCK_FILE_NAME: &str = ".lock";
pub const JOURNAL_FILE: &str = "index.json";
pub const JOURNAL_TMP_EXT: &str = "tmp";

// Версия формата журнала (поле "version" в index.json)
pub const JOURNAL_VERSION: u32 = 1;

// Длина случайного имени run-каталога в байтах (hex => x2 символов)
pub const RUN_NAME_BYTES: usize = 8;

// -------- Payload naming --------
// Ширина номера файла: 00001, 00002, ...
pub const SEQ_WIDTH: usize = 5;
pub const SEQ_START: u64 = 1;

// -------- Encoding defaults --------
pub const DEFAULT_JPEG_QUALITY: u8 = 75;
pub const DEFAULT_THUMB_SIZE: u32 = 256;

// Порог бинаризации для BlackWhite (0..=255)
pub const BILEVEL_THRESHOLD: u8 = 128;
