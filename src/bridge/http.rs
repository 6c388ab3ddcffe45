use std::time::Duration;

use reqwest::blocking::Client;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use super::TaxonomyBridge;
use super::ops::TaxonomyOp;
use crate::error::{Error, Result};
use crate::types::TenantContext;

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: Option<String>,
}

/// Sends bridge operations to the tenant's own `/bridge/{site}` endpoint.
///
/// Reads go out as `GET ?op=..&args=..`, writes as a form-encoded POST with
/// the same fields. `args` is the JSON array of positional arguments.
#[derive(Clone)]
pub struct HttpBridge {
    client: Client,
}

impl HttpBridge {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }
}

impl TaxonomyBridge for HttpBridge {
    fn call(&self, tenant: &TenantContext, op: &TaxonomyOp) -> Result<Value> {
        let url = tenant.bridge_url();
        let (name, args) = op.to_wire();
        let args = serde_json::to_string(&args)?;
        let fields = [("op", name), ("args", args.as_str())];

        debug!(url = %url, op = name, "Bridge call");
        let resp = if op.is_write() {
            self.client.post(&url).form(&fields).send()?
        } else {
            self.client.get(&url).query(&fields).send()?
        };

        let status = resp.status();
        if status.is_success() {
            return Ok(resp.json()?);
        }

        let message = resp
            .json::<ErrorBody>()
            .ok()
            .and_then(|body| body.error)
            .unwrap_or_else(|| "no details provided".to_string());
        Err(Error::Bridge(format!("{name} on {url}: {status}: {message}")))
    }
}
