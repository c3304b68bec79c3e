pub mod ambience;
pub mod app;
pub mod clock;
pub mod config;
pub mod ipc;
pub mod logging;
pub mod notify;
pub mod profile;
pub mod room;
pub mod session;
pub mod storage;
pub mod ui;
