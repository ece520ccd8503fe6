mod handler;
mod model;

pub use handler::upload;
pub use model::UploadResponse;
