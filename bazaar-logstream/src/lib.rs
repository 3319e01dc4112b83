pub mod consumer;
pub mod producer;

pub use consumer::run;
pub use producer::LogEmitter;
