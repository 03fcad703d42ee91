pub mod actions;
mod app;
pub mod events;
mod run;

pub use app::App;
