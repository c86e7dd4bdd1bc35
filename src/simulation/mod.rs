mod events;

pub use events::{ScintillationConfig, create_rng, generate_event};
