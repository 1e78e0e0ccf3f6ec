//! Replace-in-place container deployments.
//!
//! A [`task::Dispatcher`] decodes deploy requests and hands them to a
//! [`deploy::Reconciler`], which drives a [`runtime::ContainerRuntime`]
//! (normally [`docker::DockerCli`]) through stop, remove, pull, create and
//! start for one named container.

pub mod config;
pub mod deploy;
pub mod docker;
pub mod runtime;
pub mod task;
