use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub ttl_minutes: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AvatarConfig {
    pub tmp_dir: String,
    pub public_dir: String,
    pub public_base: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub base_url: String,
    pub jwt: JwtConfig,
    pub avatars: AvatarConfig,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL")?;
        let base_url =
            std::env::var("BASE_URL").unwrap_or_else(|_| "http://localhost:8080".into());
        let jwt = JwtConfig {
            secret: std::env::var("JWT_SECRET")?,
            ttl_minutes: std::env::var("JWT_TTL_MINUTES")
                .ok()
                .and_then(|v| v.parse::<i64>().ok())
                .unwrap_or(60),
        };
        let avatars = AvatarConfig {
            tmp_dir: std::env::var("AVATAR_TMP_DIR").unwrap_or_else(|_| "tmp".into()),
            public_dir: std::env::var("AVATAR_PUBLIC_DIR")
                .unwrap_or_else(|_| "public/avatars".into()),
            public_base: std::env::var("AVATAR_PUBLIC_BASE")
                .unwrap_or_else(|_| "/avatars".into()),
        };
        Ok(Self {
            database_url,
            base_url,
            jwt,
            avatars,
        })
    }
}
