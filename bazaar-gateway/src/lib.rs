pub mod auth;
pub mod frames;
pub mod handlers;
pub mod server;
pub mod service;
pub mod socket;

pub use server::run;
