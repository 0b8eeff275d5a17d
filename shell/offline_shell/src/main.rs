mod shell;

use clap::Parser;
use std::net::{IpAddr, SocketAddr};
use tracing::info;

const DEFAULT_PORT: u16 = 17620;

#[derive(Parser, Debug)]
#[command(name = "offline_shell", version)]
struct Args {
    /// Listen address. Point the browser here instead of at the site.
    ///
    /// Accepts ip:port (e.g. 127.0.0.1:17620), ip, or localhost[:port].
    #[arg(long, default_value = "127.0.0.1:17620")]
    listen: String,

    /// Origin every request is passed through to, e.g. https://graciousfastfood.example
    #[arg(long)]
    upstream: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "offline_shell=info".into()),
        )
        .init();

    let args = Args::parse();
    let addr = parse_listen(&args.listen)?;

    let shell = shell::install(&args.upstream)?.activate();

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("offline shell on http://{addr} -> {}", args.upstream);
    axum::serve(listener, shell.router())
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

fn parse_listen(input: &str) -> anyhow::Result<SocketAddr> {
    if let Ok(addr) = input.parse::<SocketAddr>() {
        return Ok(addr);
    }

    if let Ok(ip) = input.parse::<IpAddr>() {
        return Ok(SocketAddr::new(ip, DEFAULT_PORT));
    }

    if input == "localhost" {
        return Ok(SocketAddr::new(IpAddr::from([127, 0, 0, 1]), DEFAULT_PORT));
    }

    if let Some(port_str) = input.strip_prefix("localhost:") {
        let port: u16 = port_str.parse().map_err(|_| {
            anyhow::anyhow!(
                "invalid --listen '{}': bad port. Example: 127.0.0.1:{}",
                input,
                DEFAULT_PORT
            )
        })?;
        return Ok(SocketAddr::new(IpAddr::from([127, 0, 0, 1]), port));
    }

    Err(anyhow::anyhow!(
        "invalid --listen '{}'. Use ip:port (e.g. 127.0.0.1:{}) or ip (e.g. 127.0.0.1).",
        input,
        DEFAULT_PORT
    ))
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("shutdown requested");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_listen_defaults_port() {
        assert_eq!(parse_listen("127.0.0.1").unwrap().port(), DEFAULT_PORT);
        assert_eq!(parse_listen("localhost:9").unwrap().port(), 9);
        assert_eq!(
            parse_listen("[::1]:8080").unwrap(),
            "[::1]:8080".parse::<SocketAddr>().unwrap()
        );
        assert!(parse_listen("shell.local").is_err());
    }
}
