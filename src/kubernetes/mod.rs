mod client;
pub mod inventory;
mod portforward;

pub use client::ClusterClient;
pub use inventory::{InventoryProvider, KubeInventory};
pub use portforward::PortForwardTunnels;
