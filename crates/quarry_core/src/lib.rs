pub mod events;
pub mod handoff;
pub mod jobs;
