use wayward::config::Config;
use wayward::http::response::plain_text;
use wayward::routing::Router;
use wayward::server::Engine;

fn main() -> anyhow::Result<()> {
    let cfg = Config::load()?;

    tracing_subscriber::fmt()
        .with_target(false)
        .with_level(true)
        .with_max_level(cfg.log_level())
        .init();

    let mut router = Router::new();
    router.get("/", |_req, res| plain_text(res, "Hello, Wayward!"));
    router.get("/hello/:name", |req, res| {
        let name = req.param("name").unwrap_or("stranger");
        plain_text(res, format!("Hello, {}!", name));
    });

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    let local = tokio::task::LocalSet::new();

    local.block_on(&runtime, async {
        let engine = Engine::new(router, &cfg);

        for endpoint in &cfg.listen {
            engine.listen(endpoint).await?;
        }

        engine
            .run(async {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    tracing::error!(error = %e, "Failed to listen for shutdown signal");
                    std::future::pending::<()>().await;
                }
            })
            .await
    })
}
