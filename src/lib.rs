pub mod app;
pub mod batch;
pub mod config;
pub mod domain;
pub mod error;
pub mod fasta;
pub mod fetcher;
pub mod input;
pub mod ncbi;
pub mod output;
pub mod pool;
pub mod progress;
pub mod sink;
pub mod store;
pub mod tui;
