//! fntrip - serve a function over local HTTP.
//!
//! Every request received on the listen address is forwarded to one function
//! through its invoke endpoint, and the function's response is written back.

use clap::Parser;
use fntrip::error::BoxError;
use fntrip::invoke::HttpInvoker;
use fntrip::runtime::{cancel_on_signal, ProxyConfig, ProxyServer};
use fntrip::transport::{BufferedTransport, StreamingTransport};
use tracing_subscriber::EnvFilter;

/// Command line arguments.
#[derive(Debug, Parser)]
#[command(name = "fntrip", about = "Forward local HTTP requests to a function", version)]
struct Args {
    /// Name of the function to invoke
    function_name: String,

    /// Host address to bind to
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    /// Port to listen on
    #[arg(short, long, default_value_t = 8080)]
    port: u16,

    /// Base URI of the invoke endpoint
    #[arg(long, env = "FNTRIP_ENDPOINT", default_value = "http://127.0.0.1:9000")]
    endpoint: String,

    /// Function alias or version
    #[arg(short, long)]
    qualifier: Option<String>,

    /// Invoke with a streamed response
    #[arg(long, default_value_t = false)]
    streaming: bool,

    /// Seconds to wait for the function to respond
    #[arg(long, default_value_t = 30)]
    request_timeout: u64,

    /// Maximum request body size in bytes
    #[arg(long, default_value_t = 6 * 1024 * 1024)]
    max_body_size: usize,
}

impl Args {
    fn into_config(self) -> ProxyConfig {
        let mut config = ProxyConfig::new(self.function_name)
            .host(self.host)
            .port(self.port)
            .endpoint(self.endpoint)
            .streaming(self.streaming)
            .request_timeout(self.request_timeout)
            .max_body_size(self.max_body_size);
        if let Some(qualifier) = self.qualifier {
            config = config.qualifier(qualifier);
        }
        config
    }
}

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Args::parse().into_config();
    let invoker = HttpInvoker::new(config.endpoint.clone());

    tracing::info!(
        function = %config.function_name,
        endpoint = %invoker.endpoint(),
        "Starting fntrip proxy"
    );

    if config.streaming {
        let server = ProxyServer::new(config, StreamingTransport::new(invoker));
        cancel_on_signal(server.shutdown_token());
        server.run().await
    } else {
        let server = ProxyServer::new(config, BufferedTransport::new(invoker));
        cancel_on_signal(server.shutdown_token());
        server.run().await
    }
}
