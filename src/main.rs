use leaderboard::api::server;

#[tokio::main]
async fn main() -> eyre::Result<()> {
    server::run_server().await
}
