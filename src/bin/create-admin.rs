//! Create an administrator account.
//!
//! Usage: create-admin --email EMAIL --name NAME --password PASSWORD
//!   The password may also come from ADMIN_PASSWORD.

use clap::Parser;

use adoption_api::{db, services::auth::AuthService};

#[derive(Parser)]
#[command(name = "create-admin", about = "Create an administrator account in the adoption database")]
struct Args {
    /// Login email of the new admin
    #[arg(long)]
    email: String,

    /// Display name
    #[arg(long, default_value = "System Administrator")]
    name: String,

    /// Plain-text password, hashed before storage
    #[arg(long, env = "ADMIN_PASSWORD")]
    password: String,

    #[arg(long, env = "DATABASE_URL", default_value = "sqlite://adoption_system.db?mode=rwc")]
    database_url: String,

    #[arg(long, env = "BCRYPT_COST", default_value_t = bcrypt::DEFAULT_COST)]
    bcrypt_cost: u32,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let args = Args::parse();
    if args.password.is_empty() {
        anyhow::bail!("password must not be empty");
    }

    let pool = db::create_pool(&args.database_url, 1).await?;
    db::run_migrations(&pool).await?;

    let created = AuthService::ensure_admin(&pool, &args.name, &args.email, &args.password, args.bcrypt_cost).await?;
    if created {
        tracing::info!("Admin account created: {}", args.email);
    } else {
        tracing::warn!("An account with email {} already exists, nothing changed", args.email);
    }

    Ok(())
}
