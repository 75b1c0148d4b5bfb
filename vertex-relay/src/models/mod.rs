pub mod request;
pub mod response;

pub use request::{Content, RelayRequest};
pub use response::RelayResponse;
