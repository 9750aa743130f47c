//! Resource Blog - Rust Backend
//!
//! AI-assisted content pipeline for a resource-sharing blog: article
//! generation with provider fallback, movie poster lookup, publishing into
//! the headless CMS, and search engine URL submission.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderName, Method},
    routing::{get, post},
    Router,
};
use clap::{Parser, Subcommand};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod api;
mod batch;
mod config;
mod error;
mod generation;
mod llm;
mod media;
mod model;
mod prompts;
mod publisher;
mod rate_limit;
mod seo;
mod store;

use config::AppConfig;
use generation::{FallbackPolicy, Orchestrator};
use media::MediaResolver;
use model::ResourceDescription;
use publisher::{CategoryPolicy, Publisher};
use rate_limit::RateLimiter;
use seo::BaiduPushClient;
use store::{ContentStore, MemoryStore, PostFilter, SanityStore};

/// Command line arguments
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Enable debug level logging
    #[arg(long, global = true, default_value_t = false)]
    debug: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP API (default)
    Serve,

    /// Generate one article and print it as JSON
    Generate {
        #[arg(long)]
        title: String,
        #[arg(long)]
        category: Option<String>,
        /// Comma-separated
        #[arg(long, value_delimiter = ',')]
        tags: Vec<String>,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        download_link: Option<String>,
    },

    /// Publish every new resource from a resources file
    Publish {
        #[arg(long, default_value = "resources.json")]
        resources: PathBuf,
        #[arg(long, default_value = "processed/published-titles.txt")]
        processed: PathBuf,
        /// Publish into an in-memory store instead of the CMS
        #[arg(long, default_value_t = false)]
        dry_run: bool,
        #[arg(long, default_value = "template")]
        on_all_failed: FallbackPolicy,
    },

    /// Submit the newest post URLs to Baidu
    PushUrls {
        #[arg(long, default_value_t = seo::DAILY_QUOTA)]
        recent: usize,
    },
}

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub orchestrator: Orchestrator,
    pub resolver: MediaResolver,
    pub publisher: Publisher,
    pub rate_limiter: Arc<RateLimiter>,
    pub baidu: BaiduPushClient,
}

impl AppState {
    fn new(config: AppConfig, store: Arc<dyn ContentStore>) -> Self {
        let orchestrator = Orchestrator::new(config.text_providers(), config.api_fallback);
        let publisher = Publisher::new(store, CategoryPolicy::RequireExisting)
            .with_revalidate_url(config.revalidate_url.clone());
        Self {
            orchestrator,
            resolver: config.media_resolver(),
            publisher,
            rate_limiter: Arc::new(RateLimiter::new(
                config.rate_limit_max,
                Duration::from_secs(config.rate_limit_window_secs),
            )),
            baidu: BaiduPushClient::new(config.site_url.clone(), config.baidu_push_token.clone()),
            config: Arc::new(config),
        }
    }
}

/// The CMS when configured, otherwise a process-local store
fn build_store(config: &AppConfig) -> Arc<dyn ContentStore> {
    match &config.sanity {
        Some(sanity) => {
            tracing::info!(
                "Using Sanity project {} / dataset {}",
                sanity.project_id,
                sanity.dataset
            );
            Arc::new(SanityStore::new(sanity.clone()))
        }
        None => {
            tracing::warn!("SANITY_PROJECT_ID / SANITY_API_TOKEN not set, posts are kept in memory only");
            Arc::new(MemoryStore::new())
        }
    }
}

pub fn build_router(state: AppState) -> Router {
    // Setup CORS - Allow credentials by mirroring request origin
    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::AllowOrigin::mirror_request())
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            header::COOKIE,
            HeaderName::from_static("x-auth-key"),
        ]);

    Router::new()
        // ============ Generation API ============
        .route(
            "/api/generate-content",
            get(api::generate::generation_status).post(api::generate::generate_content),
        )
        // ============ Admin API ============
        .route(
            "/api/recycle-bin",
            get(api::admin::list_deleted)
                .post(api::admin::recycle_action)
                .delete(api::admin::empty_recycle_bin),
        )
        .route(
            "/api/posts-management",
            get(api::admin::list_posts).post(api::admin::management_action),
        )
        // ============ SEO API ============
        .route("/api/baidu-push", post(api::seo::baidu_push))
        // ============ Health Check ============
        .route("/health", get(|| async { "OK" }))
        .layer(DefaultBodyLimit::max(1024 * 1024))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    // Load environment variables
    dotenvy::dotenv().ok();

    // Determine log level based on --debug flag
    let log_level = if args.debug { "debug" } else { "info" };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    // Initialize logging (File + Stdout)
    let file_appender = tracing_appender::rolling::daily("logs", "resource_blog.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stdout))
        .with(env_filter)
        .init();

    tracing::info!("Log level: {}", log_level);

    let config = AppConfig::from_env()?;

    match args.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(config).await,
        Command::Generate {
            title,
            category,
            tags,
            description,
            download_link,
        } => {
            let description = ResourceDescription {
                title,
                category,
                tags,
                description,
                download_link,
            };
            let orchestrator = Orchestrator::new(config.text_providers(), FallbackPolicy::Template);
            let generation = orchestrator.orchestrate(&description).await?;
            println!("{}", serde_json::to_string_pretty(&generation)?);
            Ok(())
        }
        Command::Publish {
            resources,
            processed,
            dry_run,
            on_all_failed,
        } => publish(config, resources, processed, dry_run, on_all_failed).await,
        Command::PushUrls { recent } => push_urls(config, recent).await,
    }
}

async fn serve(config: AppConfig) -> anyhow::Result<()> {
    let addr = config.addr();
    let store = build_store(&config);
    let state = AppState::new(config, store);

    tracing::info!(
        "AI providers: {:?}, fallback: {:?}",
        state.orchestrator.provider_names(),
        state.orchestrator.policy()
    );

    let app = build_router(state);

    tracing::info!("Starting server on {}", addr);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

async fn publish(
    config: AppConfig,
    resources: PathBuf,
    processed: PathBuf,
    dry_run: bool,
    on_all_failed: FallbackPolicy,
) -> anyhow::Result<()> {
    let json = tokio::fs::read_to_string(&resources).await.map_err(|e| {
        anyhow::anyhow!("cannot read {}: {}", resources.display(), e)
    })?;
    let descriptions = batch::parse_resources(&json)?;
    tracing::info!("Loaded {} resource(s) from {}", descriptions.len(), resources.display());

    let store: Arc<dyn ContentStore> = if dry_run {
        tracing::info!("Dry run: publishing into memory");
        Arc::new(MemoryStore::new())
    } else {
        build_store(&config)
    };

    let publisher = Publisher::new(store, CategoryPolicy::CreateMissing)
        .with_revalidate_url(if dry_run { None } else { config.revalidate_url.clone() });
    let batch = batch::BatchPublisher::new(
        Orchestrator::new(config.text_providers(), on_all_failed),
        config.media_resolver(),
        publisher,
        processed,
    );

    let report = batch.run(descriptions).await?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    if report.failed() > 0 {
        anyhow::bail!("{} resource(s) failed to publish", report.failed());
    }
    Ok(())
}

async fn push_urls(config: AppConfig, recent: usize) -> anyhow::Result<()> {
    let client = BaiduPushClient::new(config.site_url.clone(), config.baidu_push_token.clone());
    let store = build_store(&config);

    let posts = store.list_posts(PostFilter::Active).await?;
    let urls = client.post_urls(&posts, recent);
    if urls.is_empty() {
        tracing::info!("No posts to push");
        return Ok(());
    }

    let result = client.push(&urls).await?;
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}
