//! Runtime configuration.
//!
//! Values are layered: built-in defaults, then `certgen.toml` in the working
//! directory, then `CERTGEN_*` environment variables (for example
//! `CERTGEN_PORT=9000` or `CERTGEN_BUCKET_DIR=/srv/bucket`).

use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

const CONFIG_FILE: &str = "certgen.toml";
const ENV_PREFIX: &str = "CERTGEN_";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    pub service_name: String,
    pub host: String,
    pub port: u16,
    pub log_level: String,
    /// SQLite file backing the metadata store.
    pub database_path: String,
    /// Root directory of the certificate bucket.
    pub bucket_dir: PathBuf,
    /// Directory for uploaded template markup.
    pub templates_dir: PathBuf,
    pub fonts_dir: PathBuf,
    pub font_family: String,
    /// Lifetime of the current-batch pointer.
    pub batch_ttl_secs: u64,
    /// Lifetime of participant records, 0 keeps them until replaced.
    pub participant_ttl_secs: u64,
    pub max_upload_bytes: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            service_name: "Certificate Generation Service".to_string(),
            host: "127.0.0.1".to_string(),
            port: 8080,
            log_level: "info".to_string(),
            database_path: "certgen.sqlite".to_string(),
            bucket_dir: PathBuf::from("./data/bucket"),
            templates_dir: PathBuf::from("./data/templates"),
            fonts_dir: PathBuf::from("./fonts"),
            font_family: "Arial".to_string(),
            batch_ttl_secs: 3600,
            participant_ttl_secs: 3600,
            max_upload_bytes: 50 * 1024 * 1024,
        }
    }
}

impl Settings {
    pub fn load() -> Result<Self, figment::Error> {
        Self::figment().extract()
    }

    fn figment() -> Figment {
        Figment::from(Serialized::defaults(Settings::default()))
            .merge(Toml::file(CONFIG_FILE))
            .merge(Env::prefixed(ENV_PREFIX))
    }

    pub fn batch_ttl(&self) -> Duration {
        Duration::from_secs(self.batch_ttl_secs)
    }

    pub fn participant_ttl(&self) -> Option<Duration> {
        (self.participant_ttl_secs > 0).then(|| Duration::from_secs(self.participant_ttl_secs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_overrides_defaults() {
        figment::Jail::expect_with(|jail| {
            jail.set_env("CERTGEN_PORT", "9100");
            jail.set_env("CERTGEN_BATCH_TTL_SECS", "60");
            let settings = Settings::load()?;
            assert_eq!(settings.port, 9100);
            assert_eq!(settings.batch_ttl(), Duration::from_secs(60));
            assert_eq!(settings.host, "127.0.0.1");
            Ok(())
        });
    }

    #[test]
    fn toml_file_is_read() {
        figment::Jail::expect_with(|jail| {
            jail.create_file(
                CONFIG_FILE,
                r#"
                    font_family = "LiberationSans"
                    participant_ttl_secs = 0
                "#,
            )?;
            let settings = Settings::load()?;
            assert_eq!(settings.font_family, "LiberationSans");
            assert_eq!(settings.participant_ttl(), None);
            Ok(())
        });
    }
}
