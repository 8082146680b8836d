use clap::Parser;

#[tokio::main]
async fn main() {
    let args = cli::Args::parse();
    std::process::exit(cli::run(args).await);
}
