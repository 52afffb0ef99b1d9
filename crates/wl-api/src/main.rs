#[tokio::main]
async fn main() {
    if let Err(err) = wl_api::run().await {
        eprintln!("wl-api failed to start: {err}");
        std::process::exit(1);
    }
}
