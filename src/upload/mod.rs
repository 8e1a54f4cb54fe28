pub mod filename;
pub mod handler;
pub mod template;

pub use filename::{allowed_file, secure_filename, static_url, web_path};
pub use handler::{UploadOutcome, UploadedFile, process_upload};
pub use template::RequestContext;
