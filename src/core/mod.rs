pub mod config;
pub mod errors;
pub mod token_registry;

// Re-export the types most callers need
pub use config::{BridgeScenario, ChainDescriptor, HarnessConfig, HarnessSettings, TokenConfig};
pub use errors::{HarnessError, Result};
pub use token_registry::{TokenDescriptor, TokenRegistry};
