//! Command-line configuration for the `chatrelay` binary.

use std::fmt;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use clap::{Parser, ValueEnum};

/// Which transports the server listens on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum TransportMode {
    /// TCP only.
    Tcp,
    /// UDP only.
    Udp,
    /// TCP and UDP on the same port.
    Both,
}

impl TransportMode {
    /// Returns `true` if a TCP listener should be started.
    pub fn has_stream(self) -> bool {
        matches!(self, Self::Tcp | Self::Both)
    }

    /// Returns `true` if a UDP socket should be started.
    pub fn has_datagram(self) -> bool {
        matches!(self, Self::Udp | Self::Both)
    }
}

impl fmt::Display for TransportMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Tcp => "tcp",
            Self::Udp => "udp",
            Self::Both => "both",
        })
    }
}

/// Server settings, parsed from the command line or environment.
#[derive(Debug, Clone, Parser)]
#[command(name = "chatrelay", version, about = "TCP/UDP chat relay server")]
pub struct ServerConfig {
    /// Address to listen on
    #[arg(long, env = "CHATRELAY_HOST", default_value_t = IpAddr::V4(Ipv4Addr::UNSPECIFIED))]
    pub host: IpAddr,

    /// Port to listen on (shared by TCP and UDP)
    #[arg(
        long,
        env = "CHATRELAY_PORT",
        default_value_t = 8888,
        value_parser = clap::value_parser!(u16).range(1024..)
    )]
    pub port: u16,

    /// Transports to serve
    #[arg(
        long = "protocol",
        env = "CHATRELAY_PROTOCOL",
        value_enum,
        default_value_t = TransportMode::Both
    )]
    pub mode: TransportMode,

    /// Maximum number of users logged in at once
    #[arg(
        long,
        env = "CHATRELAY_MAX_CLIENTS",
        default_value_t = 5,
        value_parser = parse_max_clients
    )]
    pub max_clients: usize,
}

impl ServerConfig {
    /// The socket address both listeners bind to.
    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: 8888,
            mode: TransportMode::Both,
            max_clients: 5,
        }
    }
}

fn parse_max_clients(s: &str) -> Result<usize, String> {
    let n: usize = s.parse().map_err(|e| format!("{e}"))?;
    if n == 0 {
        return Err("must be at least 1".to_string());
    }
    Ok(n)
}
