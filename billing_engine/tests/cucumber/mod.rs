pub mod billing_world;
pub mod setups;
pub mod steps;

pub use billing_world::BillingWorld;
