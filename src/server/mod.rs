mod definition;
#[allow(clippy::module_inception)]
mod server;
mod task;

pub use definition::*;
pub use server::make_ws_server;
