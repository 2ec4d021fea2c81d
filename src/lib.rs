pub mod global;
pub mod judger;
pub mod server;
