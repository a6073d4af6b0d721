pub mod agent;
pub mod client;
pub mod supervisor;

pub use client::{ScanAgentClient, ScanVerdict};
pub use supervisor::AgentSupervisor;
