#[tokio::main]
async fn main() {
    if let Err(err) = relay::mcp::server::run_stdio().await {
        eprintln!("relay: {}", err);
        std::process::exit(1);
    }
}
