pub mod citations;
pub mod config;
pub mod events;
pub mod jobs;
pub mod lifecycle;
pub mod progress;
pub mod relay;
pub mod terminal;
pub mod upstream;
