pub mod app;
pub mod options;

pub use app::RawArgs;
pub use options::{OutputFormat, Options};
