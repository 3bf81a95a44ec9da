use async_trait::async_trait;

/// Source of the bearer credential attached to backend calls.
///
/// Token storage and refresh belong to the host app's session component;
/// the billing pipeline only asks for the current token per request.
#[async_trait]
pub trait TokenProvider: Send + Sync {
    /// The current bearer token, or `None` when no session exists.
    async fn bearer_token(&self) -> Option<String>;
}
