use async_trait::async_trait;
use reqwest::Response;

/// Information about an unsuccessful response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotSuccessResponseInfo {
    pub status_code: u16,
    pub text: String,
}

#[async_trait]
pub trait ResponseExt {
    /// Hands the response back if its status is a success, otherwise reads
    /// the body so the error payload can be normalized.
    async fn check_success(self) -> Result<Self, NotSuccessResponseInfo>
    where
        Self: Sized;
}

#[async_trait]
impl ResponseExt for Response {
    async fn check_success(self) -> Result<Self, NotSuccessResponseInfo> {
        let status = self.status();
        if !status.is_success() {
            let text = self.text().await.unwrap_or_else(|e| {
                tracing::debug!("Failed to read error response body: {}", e);
                String::new()
            });
            tracing::debug!("Unsuccessful response: {} {}", status, text);
            return Err(NotSuccessResponseInfo {
                status_code: status.as_u16(),
                text,
            });
        }
        Ok(self)
    }
}
