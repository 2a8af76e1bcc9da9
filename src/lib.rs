pub mod config;
pub mod dispatcher;
pub mod error;
pub mod http;
pub mod models;
pub mod modes;
pub mod repl;
pub mod session;
pub mod transport;

pub use crate::config::Config;
pub use crate::dispatcher::QueryDispatcher;
pub use crate::error::{AssistantError, Result};
pub use crate::modes::{Mode, ModeProfile};
pub use crate::session::Session;
pub use crate::transport::{AzureConnector, Connector, Transport};
