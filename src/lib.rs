#![forbid(unsafe_code)]

pub mod cli;
pub mod config;
pub mod export;
pub mod fetch;
pub mod formats;
pub mod html;
pub mod library;
pub mod logging;
pub mod markdown;
pub mod output;
pub mod reader;
pub mod slug;
