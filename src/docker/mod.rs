// Container runtime access
// The runtime is driven through its CLI; nothing here talks to a daemon API

pub mod cli;
pub mod container;

pub use cli::{ContainerRuntime, DockerCli};
