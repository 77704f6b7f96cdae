pub mod bridge;
pub mod registry;
pub mod row;
pub mod table;

pub use bridge::{Bridge, NullBridge};
pub use registry::Registry;
pub use row::{Columns, Row};
pub use table::{ChangeEvent, Table, TableError};
