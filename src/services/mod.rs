pub mod annotation_client;
pub mod chat_backend;
pub mod content_resolver;
pub mod warn_writer;

pub use annotation_client::{AnnotationClient, PreparedRequest, DEFAULT_SYSTEM_PROMPT};
pub use chat_backend::{ChatBackend, OpenAiBackend};
pub use content_resolver::ContentResolver;
pub use warn_writer::WarnWriter;
