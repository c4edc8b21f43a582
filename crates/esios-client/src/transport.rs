use async_trait::async_trait;
use esios_types::EsiosError;

/// The network seam. Every HTTP call the rest of the workspace makes goes
/// through this trait, so tests can swap in a scripted fake instead of
/// hitting the real API.
#[async_trait]
pub trait Transport: Send + Sync {
    /// `GET` a JSON endpoint under the ESIOS API root, with `query` appended
    /// as `?key=value` pairs. Implementations own retry/backoff and auth.
    async fn get_json(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<serde_json::Value, EsiosError>;

    /// Download an arbitrary URL (an archive bundle's `download` link) to
    /// memory. ESIOS archive downloads redirect to a pre-signed storage
    /// URL that rejects the API key header, so implementations must not
    /// forward it past the first hop.
    async fn download(&self, url: &str) -> Result<bytes::Bytes, EsiosError>;
}
