pub mod model;
pub mod parse;
pub mod ports;
pub mod progress;
pub mod prompt;
pub mod service;
