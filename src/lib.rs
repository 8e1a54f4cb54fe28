pub mod config;
pub mod detector;
pub mod error;
pub mod server;
pub mod upload;

// 重新导出常用类型和函数
pub use config::Config;
pub use detector::{Detector, UnavailableDetector, YoloDetector, load_or_unavailable};
pub use server::{AppState, build_router, ensure_dirs, serve};
pub use upload::{UploadOutcome, UploadedFile, allowed_file, process_upload, secure_filename};
