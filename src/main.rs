use std::io::{self, BufRead};
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result, anyhow, bail};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use service_launcher::config;
use service_launcher::deploy::{DeployEvent, Reconciler, RestartConfig};
use service_launcher::docker::DockerCli;
use service_launcher::task::{DeployHandle, Dispatcher, Task};

/// How often `serve` checks accepted deploys for a result.
const REAP_INTERVAL: Duration = Duration::from_millis(100);

const USAGE: &str = "usage: service-launcher [serve] | restart <name> | stop <name> | rm <name> | logs <name> | inspect <name>";

fn main() -> Result<()> {
    let cwd = std::env::current_dir().context("cannot determine working directory")?;
    let cfg = config::load(&cwd)?;
    init_tracing(&cfg.log_filter);

    let docker = DockerCli::new(&cfg);
    if let Err(e) = docker.engine().ensure_available() {
        warn!(error = %e, "docker is not reachable; runtime calls will fail");
    }
    let reconciler = Arc::new(Reconciler::new(Arc::new(docker)));

    let args: Vec<String> = std::env::args().skip(1).collect();
    let args: Vec<&str> = args.iter().map(String::as_str).collect();

    match args.as_slice() {
        [] | ["serve"] => serve(&Dispatcher::new(reconciler)),
        ["restart", name] => {
            reconciler.restart(&RestartConfig {
                service_name: name.to_string(),
            })?;
            Ok(())
        }
        ["stop", name] => Ok(reconciler.stop(name)?),
        ["rm", name] => Ok(reconciler.remove(name)?),
        ["logs", name] => {
            let mut stream = reconciler.logs(name)?;
            io::copy(&mut stream, &mut io::stdout().lock()).context("streaming logs")?;
            Ok(())
        }
        ["inspect", name] => match reconciler.inspect(name)? {
            Some(info) => {
                println!("{} {} {}", info.id, info.image, info.state);
                Ok(())
            }
            None => bail!("no container named {name}"),
        },
        _ => bail!(USAGE),
    }
}

/// Logs go to stderr so `logs` output on stdout stays clean.
fn init_tracing(default_filter: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

/// Read newline-delimited JSON tasks from stdin and dispatch each one.
/// Once stdin closes, wait for every accepted deploy to finish.
fn serve(dispatcher: &Dispatcher) -> Result<()> {
    let (accepted, handles) = mpsc::channel();
    let collector = thread::Builder::new()
        .name("deploy-collector".into())
        .spawn(move || collect(handles))
        .context("starting deploy collector")?;

    for (index, line) in io::stdin().lock().lines().enumerate() {
        let line = line.context("reading task from stdin")?;
        if line.trim().is_empty() {
            continue;
        }

        let task: Task = match serde_json::from_str(&line) {
            Ok(task) => task,
            Err(e) => {
                error!(line = index + 1, error = %e, "ignoring unparseable task");
                continue;
            }
        };

        match dispatcher.dispatch(&task, &[]) {
            Ok(handle) => {
                let _ = accepted.send(handle);
            }
            Err(e) => error!(line = index + 1, error = %e, "task rejected"),
        }
    }

    drop(accepted);
    info!("input closed; waiting for in-flight deploys");
    collector
        .join()
        .map_err(|_| anyhow!("deploy collector panicked"))
}

/// Drain progress from accepted deploys and log each outcome as it lands.
/// Returns once the input side is closed and every deploy has finished.
fn collect(handles: Receiver<DeployHandle>) {
    let mut in_flight: Vec<DeployHandle> = Vec::new();
    let mut open = true;

    while open || !in_flight.is_empty() {
        if open {
            match handles.recv_timeout(REAP_INTERVAL) {
                Ok(handle) => in_flight.push(handle),
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => open = false,
            }
        } else {
            thread::sleep(REAP_INTERVAL);
        }

        in_flight.retain(|handle| match handle.try_wait() {
            Some(outcome) => {
                report(handle.service(), outcome);
                false
            }
            None => true,
        });
    }
}

fn report(service: &str, outcome: Option<DeployEvent>) {
    match outcome {
        Some(DeployEvent::Completed { container_id }) => {
            info!(service, container_id = %container_id, "deployed");
        }
        Some(DeployEvent::Aborted { step, reason }) => {
            warn!(service, %step, reason = %reason, "deploy failed");
        }
        _ => warn!(service, "deploy worker exited without a result"),
    }
}
