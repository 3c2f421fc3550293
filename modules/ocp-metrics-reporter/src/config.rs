use std::env;
use std::path::{Path, PathBuf};

const SERVICE_ACCOUNT_TOKEN: &str = "/var/run/secrets/kubernetes.io/serviceaccount/token";
const SERVICE_ACCOUNT_CA: &str = "/var/run/secrets/kubernetes.io/serviceaccount/ca.crt";
const DEFAULT_API_URL: &str = "https://kubernetes.default.svc";

#[derive(Debug)]
pub enum ConfigError {
    Invalid { key: &'static str, value: String },
    TokenFile { path: PathBuf, error: String },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Invalid { key, value } => {
                write!(f, "{} has an invalid value: {:?}", key, value)
            }
            ConfigError::TokenFile { path, error } => {
                write!(f, "Failed to read token file {}: {}", path.display(), error)
            }
        }
    }
}

impl std::error::Error for ConfigError {}

#[derive(Debug, Clone)]
pub struct Config {
    pub bind: String,
    pub port: u16,
    pub scan_interval_secs: u64,
    pub api_url: String,
    pub token: Option<String>,
    pub ca_file: Option<PathBuf>,
    pub insecure_skip_tls_verify: bool,
    pub request_timeout_secs: u64,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build the config from any key lookup (the process environment in production)
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let bind = lookup("OCP_METRICS_BIND").unwrap_or_else(|| "0.0.0.0".to_string());
        let port: u16 = parse_or(&lookup, "OCP_METRICS_PORT", 8080)?;
        let scan_interval_secs: u64 = parse_or(&lookup, "OCP_METRICS_SCAN_INTERVAL", 60)?;
        let request_timeout_secs: u64 = parse_or(&lookup, "OCP_REQUEST_TIMEOUT", 30)?;

        if scan_interval_secs == 0 {
            return Err(ConfigError::Invalid {
                key: "OCP_METRICS_SCAN_INTERVAL",
                value: "0".to_string(),
            });
        }

        let api_url = lookup("OCP_API_URL")
            .or_else(|| in_cluster_api_url(&lookup))
            .unwrap_or_else(|| DEFAULT_API_URL.to_string())
            .trim_end_matches('/')
            .to_string();

        let token = match lookup("OCP_TOKEN").filter(|t| !t.trim().is_empty()) {
            Some(token) => Some(token.trim().to_string()),
            None => match lookup("OCP_TOKEN_FILE") {
                Some(path) => Some(read_token(Path::new(&path))?),
                None if Path::new(SERVICE_ACCOUNT_TOKEN).exists() => {
                    Some(read_token(Path::new(SERVICE_ACCOUNT_TOKEN))?)
                }
                None => None,
            },
        };

        let ca_file = match lookup("OCP_CA_FILE") {
            Some(path) => Some(PathBuf::from(path)),
            None => {
                let path = PathBuf::from(SERVICE_ACCOUNT_CA);
                path.exists().then_some(path)
            }
        };

        let insecure_skip_tls_verify = match lookup("OCP_INSECURE_SKIP_TLS_VERIFY") {
            None => false,
            Some(value) => match parse_bool(&value) {
                Some(flag) => flag,
                None => {
                    return Err(ConfigError::Invalid {
                        key: "OCP_INSECURE_SKIP_TLS_VERIFY",
                        value,
                    });
                }
            },
        };

        Ok(Self {
            bind,
            port,
            scan_interval_secs,
            api_url,
            token,
            ca_file,
            insecure_skip_tls_verify,
            request_timeout_secs,
        })
    }

    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.bind, self.port)
    }
}

fn parse_or<F, T>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match lookup(key) {
        None => Ok(default),
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { key, value }),
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" | "" => Some(false),
        _ => None,
    }
}

fn in_cluster_api_url<F>(lookup: &F) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    let host = lookup("KUBERNETES_SERVICE_HOST")?;
    let port = lookup("KUBERNETES_SERVICE_PORT").unwrap_or_else(|| "443".to_string());
    // IPv6 service hosts need brackets
    if host.contains(':') {
        Some(format!("https://[{}]:{}", host, port))
    } else {
        Some(format!("https://{}:{}", host, port))
    }
}

fn read_token(path: &Path) -> Result<String, ConfigError> {
    std::fs::read_to_string(path)
        .map(|t| t.trim().to_string())
        .map_err(|e| ConfigError::TokenFile {
            path: path.to_path_buf(),
            error: e.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> + use<> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    fn invalid_key(pairs: &[(&str, &str)]) -> Option<&'static str> {
        match Config::from_lookup(lookup_from(pairs)) {
            Err(ConfigError::Invalid { key, .. }) => Some(key),
            _ => None,
        }
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_lookup(lookup_from(&[("OCP_TOKEN", "abc")])).unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.scan_interval_secs, 60);
        assert_eq!(config.request_timeout_secs, 30);
        assert_eq!(config.api_url, DEFAULT_API_URL);
        assert_eq!(config.token.as_deref(), Some("abc"));
        assert!(!config.insecure_skip_tls_verify);
        assert_eq!(config.listen_addr(), "0.0.0.0:8080");
    }

    #[test]
    fn test_in_cluster_api_url() {
        let env = lookup_from(&[
            ("OCP_TOKEN", "abc"),
            ("KUBERNETES_SERVICE_HOST", "172.30.0.1"),
            ("KUBERNETES_SERVICE_PORT", "6443"),
        ]);
        let config = Config::from_lookup(env).unwrap();
        assert_eq!(config.api_url, "https://172.30.0.1:6443");
    }

    #[test]
    fn test_explicit_api_url_wins_and_is_trimmed() {
        let env = lookup_from(&[
            ("OCP_TOKEN", "abc"),
            ("OCP_API_URL", "https://api.example.com:6443/"),
            ("KUBERNETES_SERVICE_HOST", "172.30.0.1"),
        ]);
        let config = Config::from_lookup(env).unwrap();
        assert_eq!(config.api_url, "https://api.example.com:6443");
    }

    #[test]
    fn test_token_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "  sha256~secret  ").unwrap();
        let path = file.path().to_string_lossy().to_string();

        let env = lookup_from(&[("OCP_TOKEN_FILE", path.as_str())]);
        let config = Config::from_lookup(env).unwrap();
        assert_eq!(config.token.as_deref(), Some("sha256~secret"));
    }

    #[test]
    fn test_missing_token_file_is_an_error() {
        let env = lookup_from(&[("OCP_TOKEN_FILE", "/nonexistent/token")]);
        let result = Config::from_lookup(env);
        assert!(matches!(result, Err(ConfigError::TokenFile { .. })));
    }

    #[test]
    fn test_invalid_values() {
        let port = [("OCP_TOKEN", "abc"), ("OCP_METRICS_PORT", "http")];
        assert_eq!(invalid_key(&port), Some("OCP_METRICS_PORT"));

        let interval = [("OCP_TOKEN", "abc"), ("OCP_METRICS_SCAN_INTERVAL", "0")];
        assert_eq!(invalid_key(&interval), Some("OCP_METRICS_SCAN_INTERVAL"));

        let flag = [
            ("OCP_TOKEN", "abc"),
            ("OCP_INSECURE_SKIP_TLS_VERIFY", "maybe"),
        ];
        assert_eq!(invalid_key(&flag), Some("OCP_INSECURE_SKIP_TLS_VERIFY"));
    }

    #[test]
    fn test_insecure_flag() {
        let env = lookup_from(&[
            ("OCP_TOKEN", "abc"),
            ("OCP_INSECURE_SKIP_TLS_VERIFY", "true"),
        ]);
        let config = Config::from_lookup(env).unwrap();
        assert!(config.insecure_skip_tls_verify);
    }
}
