//! Hosted OpenMotics cloud API.

pub mod client;
pub mod models;

mod groupactions;
mod installations;
mod lights;
mod outputs;
mod sensors;
mod shutters;
mod thermostats;

pub use client::{
    CLOUD_API_AUTHORIZATION_PATH, CLOUD_API_TOKEN_PATH, CLOUD_API_URL, CLOUD_OAUTH_SCOPE,
    CloudClient, CloudClientBuilder,
};
pub use groupactions::GroupActions;
pub use installations::Installations;
pub use lights::Lights;
pub use outputs::Outputs;
pub use sensors::Sensors;
pub use shutters::Shutters;
pub use thermostats::Thermostats;
