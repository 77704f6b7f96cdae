pub mod body;
pub mod envelope;
pub mod message;
pub mod proxy;
pub mod reader;
pub mod tlv;
pub mod transaction;

pub use body::MessageBody;
pub use message::Message;
pub use proxy::{transition, Effect, ProxyEvent, ProxyState};
pub use tlv::TlvValue;
pub use transaction::TransactionIdGenerator;
