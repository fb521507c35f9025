#[tokio::main]
async fn main() {
    if let Err(err) = lambda_harvester::cli::run().await {
        eprintln!("Error: {:#}", err);
        std::process::exit(1);
    }
}
