pub mod config;
mod error;
mod feeds;
mod http_layers;
pub mod metrics;
mod search;
pub mod server;
mod session;
pub mod state;
mod stream;

pub use config::ServerConfig;
pub use error::ServiceError;
pub use http_layers::*;
pub use server::{make_app, make_metrics_app, run_server, ServerComponents};
pub use session::{
    GatewayHeaderResolver, Session, SessionResolver, HEADER_LISTENER_ID,
    HEADER_SUBSCRIPTION_STATUS, HEADER_SUBSCRIPTION_TIER,
};
