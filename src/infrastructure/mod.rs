// 外部服务适配器
pub mod blob;
pub mod openai;

pub use blob::{BlobStorage, VercelBlobStorage};
pub use openai::OpenAiVisionClient;
