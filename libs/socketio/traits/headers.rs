use async_trait::async_trait;
use std::collections::HashMap;

/// HTTP headers sent with the transport handshake
pub type Headers = HashMap<String, String>;

/// Trait for providing handshake headers dynamically
///
/// Called on every dial, including each reconnect attempt, so tokens
/// and timestamps can be refreshed between connections.
///
/// # Example
/// ```ignore
/// struct BearerToken {
///     store: Arc<TokenStore>,
/// }
///
/// #[async_trait::async_trait]
/// impl HeaderProvider for BearerToken {
///     async fn get_headers(&self) -> Headers {
///         let mut headers = Headers::new();
///         headers.insert("Authorization".into(), format!("Bearer {}", self.store.current()));
///         headers
///     }
/// }
/// ```
#[async_trait]
pub trait HeaderProvider: Send + Sync {
    /// Generate headers for the next handshake request
    async fn get_headers(&self) -> Headers;
}

/// A static header map is its own provider
#[async_trait]
impl HeaderProvider for Headers {
    async fn get_headers(&self) -> Headers {
        self.clone()
    }
}

/// A header provider that doesn't add any headers
pub struct NoHeaders;

#[async_trait]
impl HeaderProvider for NoHeaders {
    async fn get_headers(&self) -> Headers {
        HashMap::new()
    }
}
