use std::sync::OnceLock;
use std::time::Duration;

use anyhow::{bail, Context};
use regex::Regex;
use tokio::process::Command;

/// The Docker daemon is not running or the container name is invalid.
#[derive(derive_more::Error, derive_more::Display, Debug)]
#[display("Docker daemon is probably not running or container name is invalid: {msg}")]
pub struct ContainerUnavailable {
    pub msg: String,
}

/// How the stress tool addresses the database: the container to `docker exec` into and the node
/// address scraped from `nodetool status`. Read-only shared configuration, never mutated by runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StressTarget {
    pub container_name: String,
    pub node_ip: String,
}

const CQLSH_POLL_INTERVAL: Duration = Duration::from_secs(10);
const CQLSH_WAIT_CEILING: Duration = Duration::from_secs(150);

/// Make sure the container is running and the database inside it accepts connections, then
/// resolve the node address. Any failure here is fatal to the whole invocation, before any
/// stress process is spawned.
pub async fn prepare_target(container_name: &str) -> anyhow::Result<StressTarget> {
    which::which("docker").context("Docker CLI not found in PATH")?;

    ensure_container_running(container_name).await?;
    wait_for_cqlsh(container_name).await?;
    let node_ip = lookup_node_ip(container_name).await?;

    log::info!("Container '{container_name}' is ready, node address {node_ip}");
    Ok(StressTarget {
        container_name: container_name.to_string(),
        node_ip,
    })
}

async fn docker(args: &[&str]) -> anyhow::Result<std::process::Output> {
    Command::new("docker")
        .args(args)
        .output()
        .await
        .with_context(|| format!("Failed to run 'docker {}'", args.join(" ")))
}

async fn ensure_container_running(container_name: &str) -> anyhow::Result<()> {
    let ps = docker(&["ps"]).await?;
    if container_listed(&String::from_utf8_lossy(&ps.stdout), container_name) {
        return Ok(());
    }

    log::info!("Container '{container_name}' is not running, starting it");
    let started = docker(&["start", container_name]).await?;
    if !started.status.success() {
        let msg = String::from_utf8_lossy(&started.stderr).trim().to_string();
        return Err(ContainerUnavailable { msg }.into());
    }
    Ok(())
}

fn container_listed(ps_stdout: &str, container_name: &str) -> bool {
    ps_stdout.contains(container_name)
}

/// Poll cqlsh inside the container until it connects, so stress runs don't start against a
/// database that is still booting.
async fn wait_for_cqlsh(container_name: &str) -> anyhow::Result<()> {
    let deadline = tokio::time::Instant::now() + CQLSH_WAIT_CEILING;
    log::info!("Waiting for the database in container '{container_name}' to accept cqlsh connections");
    loop {
        let probe = docker(&["exec", container_name, "cqlsh", "-e", "exit"]).await?;
        if probe.status.success() {
            return Ok(());
        }
        if tokio::time::Instant::now() + CQLSH_POLL_INTERVAL > deadline {
            bail!(
                "Database in container '{container_name}' did not come up within {}s: {}",
                CQLSH_WAIT_CEILING.as_secs(),
                String::from_utf8_lossy(&probe.stderr).trim()
            );
        }
        tokio::time::sleep(CQLSH_POLL_INTERVAL).await;
    }
}

async fn lookup_node_ip(container_name: &str) -> anyhow::Result<String> {
    log::info!("Getting node IP from nodetool status");
    let status = docker(&["exec", container_name, "nodetool", "status"]).await?;
    extract_node_ip(&String::from_utf8_lossy(&status.stdout))
        .with_context(|| format!("No node IP address found in 'nodetool status' output for container '{container_name}'"))
}

fn extract_node_ip(nodetool_stdout: &str) -> Option<String> {
    static IP_PATTERN: OnceLock<Regex> = OnceLock::new();
    let pattern = IP_PATTERN.get_or_init(|| {
        Regex::new(r"\b(?:\d{1,3}\.){3}\d{1,3}\b").expect("static pattern is valid")
    });
    pattern
        .find(nodetool_stdout)
        .map(|m| m.as_str().to_string())
}
