pub mod catalog;
pub mod config;
pub mod crawl;
pub mod error;
pub mod export;
pub mod extract;
pub mod fetch;
pub mod grid;
pub mod page;
pub mod runtime;
pub mod schema;
pub mod selectors;

pub use runtime::run;
