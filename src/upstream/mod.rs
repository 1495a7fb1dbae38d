//! Outbound side of the relay: clients that speak to the Onshape REST API,
//! either directly or through a Flow automation proxy.

mod flow;
mod gateway;
mod onshape;

pub use flow::{FlowClient, basic_auth_signature};
pub use gateway::{ApiGateway, ProxiedResponse};
pub use onshape::OnshapeClient;
