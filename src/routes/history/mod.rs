mod handler;
mod model;

pub use handler::{clear_history, compare_with_previous, delete_analysis, get_analysis, list_history};
pub use model::{ComparisonResponse, RemoveResponse};
