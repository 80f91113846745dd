pub mod fixtures;

#[allow(unused_imports)]
pub use fixtures::{app, backend, version};
