#[macro_use]
pub mod defer;

pub mod config;
pub mod err;
pub mod parse;
pub mod state;
pub mod terminal;
