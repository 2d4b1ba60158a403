pub mod address;
pub mod config;
pub mod logging;
pub mod privileges;
pub mod resolver;
pub mod server;
pub mod srs;

pub use address::AddressKind;
pub use config::{Config, LogLevel};
pub use resolver::{Request, Resolver, Response};
pub use server::Server;
