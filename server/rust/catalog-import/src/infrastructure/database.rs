use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use sqlx::postgres::{PgPool, PgPoolOptions};
use tracing::info;

/// DatabaseConfig はデータベース接続設定。
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub host: String,
    #[serde(default = "default_db_port")]
    pub port: u16,
    pub name: String,
    pub user: String,
    #[serde(default = "default_password")]
    pub password: SecretString,
    #[serde(default = "default_ssl_mode")]
    pub ssl_mode: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    #[serde(default)]
    pub run_migrations: bool,
}

fn default_db_port() -> u16 {
    5432
}

fn default_password() -> SecretString {
    SecretString::new(String::new())
}

fn default_ssl_mode() -> String {
    "disable".to_string()
}

fn default_max_connections() -> u32 {
    25
}

impl DatabaseConfig {
    /// PostgreSQL接続URLを構築する。
    pub fn connection_url(&self) -> String {
        format!(
            "postgres://{}:{}@{}:{}/{}?sslmode={}",
            self.user,
            self.password.expose_secret(),
            self.host,
            self.port,
            self.name,
            self.ssl_mode
        )
    }
}

/// 接続プールを作成する。DATABASE_URL が設定されていれば設定ファイルより優先する。
pub async fn connect(config: Option<&DatabaseConfig>) -> anyhow::Result<Option<PgPool>> {
    let env_url = std::env::var("DATABASE_URL").ok();
    let (url, max_connections) = match (config, env_url) {
        (Some(cfg), Some(url)) => (url, cfg.max_connections),
        (Some(cfg), None) => (cfg.connection_url(), cfg.max_connections),
        (None, Some(url)) => (url, default_max_connections()),
        (None, None) => {
            info!("no database configured, using in-memory repositories");
            return Ok(None);
        }
    };
    info!("connecting to database");
    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(&url)
        .await?;
    info!("database connection pool established");
    Ok(Some(pool))
}

/// 埋め込みマイグレーションを適用する。
pub async fn run_migrations(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    info!("database migrations applied");
    Ok(())
}
