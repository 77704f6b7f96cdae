pub mod client;
pub mod login;
pub mod master;
pub mod mutation;
pub mod opcode;
pub mod record;
pub mod session;
pub mod subscribe;
pub mod teardown;
pub mod watchdog;

pub use client::ClusterClient;
pub use login::{LoginOutcome, LoginRequest, LoginResponse};
pub use master::Master;
pub use opcode::Opcode;
pub use record::CommandRecord;
pub use session::{SessionHandle, SessionRegistry};
pub use subscribe::Subscription;
