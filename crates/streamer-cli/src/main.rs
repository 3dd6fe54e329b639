//! Binary entrypoint for the `streamer` command.

#[tokio::main]
async fn main() {
    let code = streamer_cli::run().await;
    std::process::exit(code);
}
