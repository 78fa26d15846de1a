pub mod analysis;
pub mod api;
pub mod config;
pub mod error;
pub mod message;
pub mod persistence;
pub mod persona;
pub mod profile;
pub mod session;
pub mod wire;

#[cfg(test)]
mod tests;
