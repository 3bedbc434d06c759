//! Domain entity models for the Khidma presence subsystem.

pub mod presence;
pub mod session;
pub mod user;

pub use presence::PresenceView;
pub use session::model::Session;
pub use session::DeviceType;
pub use user::model::User;
pub use user::OnlineStatus;
