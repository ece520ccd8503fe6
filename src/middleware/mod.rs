mod error_handler;
mod extractors;

pub use error_handler::log_errors;
pub use extractors::{ClientIp, SESSION_HEADER, SessionId, client_ip_from_headers};
