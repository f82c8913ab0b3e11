use mersul_core::AppError;

const DEFAULT_PORT: u16 = 5000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub port: u16,
    pub public_url: Option<String>,
}

impl ServerConfig {
    /// Read configuration from environment variables.
    ///
    /// - `PORT` (optional, defaults to 5000)
    /// - `MERSUL_PUBLIC_URL` (optional): base of the `$schema` links in
    ///   responses. When unset the request's `Host` header is used.
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, AppError> {
        let port = match lookup("PORT") {
            None => DEFAULT_PORT,
            Some(raw) => raw
                .trim()
                .parse()
                .map_err(|_| AppError::Config(format!("Invalid PORT '{raw}'")))?,
        };

        let public_url = lookup("MERSUL_PUBLIC_URL")
            .map(|url| url.trim().trim_end_matches('/').to_string())
            .filter(|url| !url.is_empty());

        Ok(Self { port, public_url })
    }
}
