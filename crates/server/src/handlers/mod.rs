//! HTTP request handlers.

pub mod feed;
pub mod form;
pub mod health;
pub mod repo;
pub mod upload;

pub use feed::*;
pub use form::*;
pub use health::*;
pub use repo::*;
pub use upload::*;
