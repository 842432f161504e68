#[cfg(feature = "docker")]
pub mod docker;
#[cfg(feature = "kube")]
pub mod kubernetes;
pub mod state;
pub mod web;
