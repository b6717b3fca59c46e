//! Reference-sheet to turntable video generation on top of the Veo API.

pub mod cli;
pub mod config;
pub mod narration;
pub mod reference;
pub mod session;
pub mod veo;
