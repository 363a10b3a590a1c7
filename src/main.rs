//! Command line entry point for minihttpd.

use std::path::PathBuf;

use clap::Parser;
use log::info;

use minihttpd::{HttpServer, ServerConfig, routes};

#[derive(Parser, Debug)]
#[command(name = "minihttpd")]
#[command(about = "A minimal HTTP/1.1 server with path-template routing")]
#[command(version)]
struct Cli {
    #[arg(long = "directory")]
    #[arg(help = "Directory served by the /files routes")]
    directory: Option<PathBuf>,

    #[arg(long = "host")]
    #[arg(help = "Host to bind to [default: localhost]")]
    host: Option<String>,

    #[arg(short = 'p', long = "port")]
    #[arg(help = "Port to listen on [default: 4221]")]
    port: Option<u16>,

    #[arg(short = 'w', long = "workers")]
    #[arg(help = "Number of connections serviced concurrently [default: 10]")]
    workers: Option<usize>,

    #[arg(short = 'c', long = "config")]
    #[arg(help = "JSON configuration file, command line flags take precedence")]
    config: Option<PathBuf>,
}

impl Cli {
    fn into_config(self) -> Result<ServerConfig, minihttpd::ServerError> {
        let mut config = match &self.config {
            Some(path) => ServerConfig::from_json_file(path)?,
            None => ServerConfig::default(),
        };

        if let Some(host) = self.host {
            config.host = host;
        }
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(workers) = self.workers {
            config = config.with_workers(workers);
        }
        if let Some(directory) = self.directory {
            config = config.with_resource_directory(directory);
        }

        config.validate()?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = Cli::parse().into_config()?;
    info!("Starting minihttpd with {workers} workers", workers = config.workers);

    let mut server = HttpServer::new(config);
    routes::register(&mut server)?;

    server.run().await?;

    Ok(())
}
