pub mod ai;
pub mod config;
pub mod dispatcher;
pub mod logging;
pub mod session;
pub mod terminal;
pub mod transcript;
pub mod types;

#[cfg(feature = "ui")]
pub mod theme;
#[cfg(feature = "ui")]
pub mod ui;
#[cfg(feature = "ui")]
pub mod views;
