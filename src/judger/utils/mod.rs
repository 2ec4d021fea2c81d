pub mod request;
#[allow(clippy::module_inception)]
mod utils;

pub use request::{HttpTransport, Response, Transport};
pub use utils::*;
