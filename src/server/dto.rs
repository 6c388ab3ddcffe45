use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct CreateSiteRequest {
    pub domain: String,
    #[serde(default = "default_path")]
    pub path: String,
    /// Base URL of the new site. Derived from the server's public base URL
    /// when omitted.
    #[serde(default)]
    pub url: Option<String>,
}

fn default_path() -> String {
    "/".to_string()
}

#[derive(Debug, Deserialize)]
pub struct ConsolidateRequest {
    pub nonce: String,
    pub sources: Vec<i64>,
    pub destination: i64,
}

/// Query string or form body of a bridge call.
#[derive(Debug, Deserialize)]
pub struct BridgeParams {
    pub op: String,
    /// JSON array of positional arguments.
    #[serde(default)]
    pub args: Option<String>,
}
