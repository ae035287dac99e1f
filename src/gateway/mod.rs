//! Webservice of a gateway on the local network.

pub mod client;
pub mod models;

mod groupactions;
mod lights;
mod outputs;
mod sensors;
mod shutters;
mod thermostats;

pub use client::{GATEWAY_DEFAULT_PORT, LocalGateway, LocalGatewayBuilder};
pub use groupactions::GroupActions;
pub use lights::Lights;
pub use outputs::Outputs;
pub use sensors::Sensors;
pub use shutters::Shutters;
pub use thermostats::Thermostats;
