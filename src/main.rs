use std::sync::Arc;

use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use adoption_api::{
    config::Config,
    db,
    routes,
    services::{
        auth::AuthService,
        email::EmailService,
        storage::{DOCUMENTS_DIR, GUIDANCE_DIR, VISITS_DIR},
    },
    AppState,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;
    let config = Arc::new(config);

    let pool = db::create_pool(&config.database_url, config.database_max_connections).await?;
    db::run_migrations(&pool).await?;
    info!("Database connected and migrations applied");

    if let Some(password) = &config.default_admin_password {
        let created = AuthService::ensure_admin(
            &pool,
            "System Administrator",
            &config.default_admin_email,
            password,
            config.bcrypt_cost,
        )
        .await?;
        if created {
            info!("Default admin account created for {}", config.default_admin_email);
        }
    }

    for subdir in [DOCUMENTS_DIR, GUIDANCE_DIR, VISITS_DIR] {
        tokio::fs::create_dir_all(std::path::Path::new(&config.upload_dir).join(subdir)).await?;
    }

    let email = EmailService::new(&config).map(Arc::new);
    if email.is_some() {
        info!("SMTP email service configured");
    } else {
        info!("SMTP not configured, password reset links are only stored");
    }

    let state = AppState {
        db: pool,
        config: config.clone(),
        email,
    };

    let app = routes::router(state);

    let addr = format!("{}:{}", config.host, config.port);
    info!("Adoption case management API listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
