//! Houtong walking-tour bot: a scripted LINE dialogue that walks a visitor
//! through the old mining village one keyword at a time.

pub mod channels;
pub mod config;
pub mod dialogue;
pub mod gateway;
pub mod init;
pub mod message;
pub mod script;
pub mod session;
pub mod tour;
