//! Astronomy API provider (astronomyapi.com body events)

pub mod client;
pub mod parser;
pub mod remote;
pub mod types;

pub use client::AstronomyClient;
pub use parser::{display_type, parse_events, ParsedEvents};
pub use remote::RemoteProvider;
pub use types::EventsQuery;
