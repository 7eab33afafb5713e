pub mod settings;

pub use settings::{Setting, Settings};

use std::path::PathBuf;

use crate::hash::HashAlgo;

/// Import-engine configuration.
///
/// `cert_hash_algo` selects the digest persisted into `CERT.HASH`; it must
/// stay stable for the lifetime of a database.
#[derive(Debug, Clone)]
pub struct ImportConfig {
    pub cert_hash_algo: HashAlgo,
    pub db_path: Option<PathBuf>,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            cert_hash_algo: HashAlgo::Sha1,
            db_path: None,
        }
    }
}

impl ImportConfig {
    pub fn from_settings(settings: &dyn Settings) -> Self {
        let cert_hash_algo = match settings.get_string("cert_hash_algo") {
            None => HashAlgo::Sha1,
            Some(name) => match HashAlgo::from_name(&name) {
                Some(algo) => algo,
                None => {
                    tracing::warn!(
                        target: "ocsp_core::config",
                        "Unknown cert_hash_algo: {name}, using SHA1"
                    );
                    HashAlgo::Sha1
                }
            },
        };
        let db_path = settings.get_string("db_path").map(PathBuf::from);
        Self {
            cert_hash_algo,
            db_path,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn defaults_to_sha1() {
        let settings: HashMap<String, Setting> = HashMap::new();
        let config = ImportConfig::from_settings(&settings);
        assert_eq!(config.cert_hash_algo, HashAlgo::Sha1);
        assert!(config.db_path.is_none());
    }

    #[test]
    fn reads_algo_and_path() {
        let mut settings: HashMap<String, Setting> = HashMap::new();
        settings.set_string("cert_hash_algo", "SHA3-256".to_string());
        settings.set_string("db_path", "/var/lib/ocsp/status.db".to_string());
        let config = ImportConfig::from_settings(&settings);
        assert_eq!(config.cert_hash_algo, HashAlgo::Sha3_256);
        assert_eq!(
            config.db_path.as_deref(),
            Some(std::path::Path::new("/var/lib/ocsp/status.db"))
        );
    }

    #[test]
    fn unknown_algo_falls_back_with_warning() {
        let mut settings: HashMap<String, Setting> = HashMap::new();
        settings.set_string("cert_hash_algo", "whirlpool".to_string());
        let config = ImportConfig::from_settings(&settings);
        assert_eq!(config.cert_hash_algo, HashAlgo::Sha1);
    }
}
