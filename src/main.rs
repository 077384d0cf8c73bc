#[cfg(feature = "ui")]
fn main() {
    yanto::logging::init();
    dioxus::launch(yanto::ui::App);
}

#[cfg(not(feature = "ui"))]
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    yanto::logging::init();
    let config = yanto::config::Config::from_env();
    yanto::terminal::run(&config).await?;
    Ok(())
}
