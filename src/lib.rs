pub mod analysis;
pub mod chat;
pub mod cli;
pub mod core;
pub mod http;
pub mod profile;
pub mod storage;
pub mod view;
