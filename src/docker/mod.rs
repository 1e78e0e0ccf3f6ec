// Docker CLI backend. Each runtime call drives `docker` as a child process.

pub mod client;
pub mod commands;
pub mod engine;
pub mod run;
pub mod types;

pub use client::DockerCli;
pub use engine::Engine;
pub use run::ProcessStream;
pub use types::{CommandOutput, DockerCommand};
