mod client;

#[cfg(test)]
mod tests;

pub use client::{extract_server_message, normalize_error, resolve_url, AuthState, HttpApi};
