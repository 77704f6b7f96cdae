pub mod command;
pub mod connection;
pub mod framing;
pub mod login;
pub mod push;
pub mod reconnect;
pub mod scramble;
pub mod session;

pub use command::Command;
pub use framing::Frame;
pub use reconnect::{Reconnector, RedundancyTarget};
pub use scramble::{ScrambleCursor, ScrambleKey};
pub use session::PendingRequests;
