pub mod data_io;
pub mod fetch;
pub mod logging;
pub mod opener;
pub mod prompt;
pub mod runtime;
pub mod session;
pub mod tui;
pub mod types;
pub mod ui_utils;
pub mod urls;
pub mod validate;

pub use runtime::run;
