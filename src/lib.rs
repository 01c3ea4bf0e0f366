pub mod auth;
pub mod cli;
pub mod digikey;
pub mod metadata;
pub mod models;
pub mod pid;
pub mod server;
pub mod storage;
