//! Presence projection value objects.

pub mod view;

pub use view::PresenceView;
