use std::path::PathBuf;

/// Signing key used when `SESSION_KEY` is unset. Development only.
const DEFAULT_SESSION_KEY: [u8; 32] = [0u8; 32];
const MIN_SESSION_KEY_LEN: usize = 32;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{name} must be {expected}, got {value:?}")]
    Invalid {
        name: &'static str,
        expected: &'static str,
        value: String,
    },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub database_path: PathBuf,
    pub database_temporary: bool,
    pub session_key: Vec<u8>,
    /// False when `session_key` is the built-in development key.
    pub session_key_configured: bool,
    pub cookie_secure: bool,
    pub bcrypt_cost: u32,
}

fn invalid(name: &'static str, expected: &'static str, value: &str) -> ConfigError {
    ConfigError::Invalid {
        name,
        expected,
        value: value.to_owned(),
    }
}

fn parse_bool(name: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        _ => Err(invalid(name, "a boolean", value)),
    }
}

impl Config {
    /// Reads the process environment, after loading `.env` if there is one.
    ///
    /// | Env Var              | Default                 |
    /// |----------------------|-------------------------|
    /// | `HOST`               | `127.0.0.1`             |
    /// | `PORT`               | `8080`                  |
    /// | `DATABASE_PATH`      | `data/movieshelf`       |
    /// | `DATABASE_TEMPORARY` | `false`                 |
    /// | `SESSION_KEY`        | 32 zero bytes           |
    /// | `COOKIE_SECURE`      | `false`                 |
    /// | `BCRYPT_COST`        | `bcrypt::DEFAULT_COST`  |
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let host = lookup("HOST").unwrap_or_else(|| "127.0.0.1".to_owned());

        let port = match lookup("PORT") {
            Some(raw) => raw
                .trim()
                .parse::<u16>()
                .map_err(|_| invalid("PORT", "a port number", &raw))?,
            None => 8080,
        };

        let database_path = lookup("DATABASE_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("data/movieshelf"));

        let database_temporary = match lookup("DATABASE_TEMPORARY") {
            Some(raw) => parse_bool("DATABASE_TEMPORARY", &raw)?,
            None => false,
        };

        let (session_key, session_key_configured) = match lookup("SESSION_KEY") {
            Some(raw) if raw.len() >= MIN_SESSION_KEY_LEN => (raw.into_bytes(), true),
            Some(raw) => {
                // never echo the secret itself
                let length = format!("{} bytes", raw.len());
                return Err(invalid("SESSION_KEY", "at least 32 bytes", &length));
            }
            None => (DEFAULT_SESSION_KEY.to_vec(), false),
        };

        let cookie_secure = match lookup("COOKIE_SECURE") {
            Some(raw) => parse_bool("COOKIE_SECURE", &raw)?,
            None => false,
        };

        let bcrypt_cost = match lookup("BCRYPT_COST") {
            Some(raw) => match raw.trim().parse::<u32>() {
                Ok(cost) if (4..=31).contains(&cost) => cost,
                _ => return Err(invalid("BCRYPT_COST", "an integer in 4..=31", &raw)),
            },
            None => bcrypt::DEFAULT_COST,
        };

        Ok(Config {
            host,
            port,
            database_path,
            database_temporary,
            session_key,
            session_key_configured,
            cookie_secure,
            bcrypt_cost,
        })
    }

    pub fn open_database(&self) -> sled::Result<sled::Db> {
        if self.database_temporary {
            sled::Config::new().temporary(true).open()
        } else {
            sled::open(&self.database_path)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect::<HashMap<_, _>>();
        Config::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn defaults() {
        let config = config(&[]).unwrap();
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.port, 8080);
        assert_eq!(config.database_path, PathBuf::from("data/movieshelf"));
        assert!(!config.database_temporary);
        assert_eq!(config.session_key, vec![0u8; 32]);
        assert!(!config.session_key_configured);
        assert!(!config.cookie_secure);
        assert_eq!(config.bcrypt_cost, bcrypt::DEFAULT_COST);
    }

    #[test]
    fn overrides() {
        let key = "k".repeat(64);
        let config = config(&[
            ("HOST", "0.0.0.0"),
            ("PORT", "3000"),
            ("DATABASE_TEMPORARY", "yes"),
            ("SESSION_KEY", key.as_str()),
            ("COOKIE_SECURE", "true"),
            ("BCRYPT_COST", "4"),
        ])
        .unwrap();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 3000);
        assert!(config.database_temporary);
        assert_eq!(config.session_key, key.into_bytes());
        assert!(config.session_key_configured);
        assert!(config.cookie_secure);
        assert_eq!(config.bcrypt_cost, 4);
        assert!(config.open_database().is_ok());
    }

    #[test]
    fn rejects_bad_values() {
        for vars in &[
            [("PORT", "eighty")],
            [("SESSION_KEY", "short")],
            [("BCRYPT_COST", "2")],
            [("COOKIE_SECURE", "maybe")],
        ] {
            match config(vars) {
                Err(ConfigError::Invalid { name, .. }) => assert_eq!(name, vars[0].0),
                Ok(_) => panic!("accepted {:?}", vars),
            }
        }
    }

    #[test]
    fn short_session_key_is_not_echoed() {
        let err = config(&[("SESSION_KEY", "hunter2")]).unwrap_err();
        let message = err.to_string();
        assert!(!message.contains("hunter2"), "{}", message);
        assert!(message.contains("7 bytes"), "{}", message);
    }
}
