//! Always-on album art window for MPD.
//!
//! A background thread holds one connection to the daemon, waits for state
//! changes, resolves the current track's cover and hands it to the UI
//! thread, which scales it to fit the window.

pub mod app;
pub mod artwork;
pub mod config;
pub mod daemon;
pub mod display;
pub mod fit;
pub mod mpd_client;
pub mod poll;
