//! Live-channel servers, one per worker

use std::io;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use draft_core::config::ServerConfig;
use draft_engine::Cluster;
use draft_net::{Error, Result, Server};
use tracing::info;

/// Bind worker `i` to `base_port + i`. A base port of 0 gives every worker
/// an ephemeral port.
pub async fn start_servers(cluster: &Cluster, config: &ServerConfig) -> Result<Vec<Server>> {
    let ip: IpAddr = config.bind.parse().map_err(|e| {
        Error::Io(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("invalid bind address {}: {}", config.bind, e),
        ))
    })?;

    let mut servers = Vec::with_capacity(cluster.engines().len());
    for engine in cluster.engines() {
        let port = if config.base_port == 0 {
            0
        } else {
            u16::try_from(usize::from(config.base_port) + engine.worker()).map_err(|_| {
                Error::Io(io::Error::new(io::ErrorKind::InvalidInput, "port out of range"))
            })?
        };
        servers.push(Server::start(SocketAddr::new(ip, port), Arc::clone(engine)).await?);
    }

    info!(count = servers.len(), "Servers listening");
    Ok(servers)
}

pub fn stop_servers(servers: &[Server]) {
    for server in servers {
        server.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use draft_core::{Database, DraftConfig};

    fn cluster(workers: usize) -> Cluster {
        let mut config = DraftConfig::default();
        config.server.workers = workers;
        Cluster::start(Arc::new(Mutex::new(Database::open_in_memory().unwrap())), &config)
    }

    #[tokio::test]
    async fn test_one_server_per_worker() {
        let cluster = cluster(2);
        let config = ServerConfig {
            base_port: 0,
            ..ServerConfig::default()
        };

        let servers = start_servers(&cluster, &config).await.unwrap();
        assert_eq!(servers.len(), 2);
        assert_eq!(servers[1].worker(), 1);
        assert_ne!(servers[0].addr().port(), servers[1].addr().port());
        stop_servers(&servers);
    }

    #[tokio::test]
    async fn test_bad_bind_address() {
        let cluster = cluster(1);
        let config = ServerConfig {
            bind: "not-an-ip".to_string(),
            base_port: 0,
            ..ServerConfig::default()
        };
        assert!(matches!(start_servers(&cluster, &config).await, Err(Error::Io(_))));
    }
}
