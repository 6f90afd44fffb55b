pub mod category;
pub mod config;
pub mod dom;
pub mod fetcher;
pub mod http;
pub mod index;
pub mod links;
pub mod lister;
pub mod media;
pub mod pipeline;
pub mod runtime;
pub mod sanitize;
pub mod slug;
