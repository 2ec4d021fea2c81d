mod definition;
#[allow(clippy::module_inception)]
mod provider;

pub use definition::*;
pub use provider::*;
