pub mod obis;
pub mod server_id;
pub mod unit;
pub mod uuid;
pub mod value;
pub mod wire;

pub use obis::Obis;
pub use server_id::ServerId;
pub use uuid::Uuid;
pub use value::{ScaledValue, SmlValue, TimeValue};
pub use wire::WireValue;
