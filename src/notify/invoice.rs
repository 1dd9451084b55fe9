use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ============================================================================
// Invoice Sharing
// ============================================================================
//
// The PDF itself comes from the rendering collaborator; sharing uploads the
// artifact to durable storage and returns the link. Upload failure degrades
// to the raw renderer URL rather than failing the surrounding flow.
//
// ============================================================================

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ShareResult {
    pub url: String,
    /// False when the durable upload failed and `url` points at the raw
    /// renderer resource instead.
    pub uploaded: bool,
}

#[derive(Deserialize)]
struct UploadResponse {
    url: String,
}

pub struct InvoiceService {
    client: reqwest::Client,
    renderer_url: String,
    storage_url: Option<String>,
}

impl InvoiceService {
    pub fn new(
        renderer_url: String,
        storage_url: Option<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("building invoice client")?;
        Ok(Self {
            client,
            renderer_url,
            storage_url,
        })
    }

    pub fn raw_url(&self, order_id: Uuid) -> String {
        format!("{}/invoices/{}.pdf", self.renderer_url, order_id)
    }

    /// Fetch the rendered PDF for pass-through download.
    pub async fn fetch_pdf(&self, order_id: Uuid) -> Result<Vec<u8>> {
        let bytes = self
            .client
            .get(self.raw_url(order_id))
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .context("fetching invoice PDF")?
            .bytes()
            .await
            .context("reading invoice PDF body")?;
        Ok(bytes.to_vec())
    }

    /// Upload the invoice to durable storage and return a shareable link.
    pub async fn share(&self, order_id: Uuid) -> ShareResult {
        let fallback = ShareResult {
            url: self.raw_url(order_id),
            uploaded: false,
        };

        let storage_url = match &self.storage_url {
            Some(url) => url.clone(),
            None => {
                tracing::warn!(order_id = %order_id, "invoice storage not configured, sharing raw URL");
                return fallback;
            }
        };

        let pdf = match self.fetch_pdf(order_id).await {
            Ok(pdf) => pdf,
            Err(error) => {
                tracing::warn!(order_id = %order_id, error = %error, "invoice fetch failed, sharing raw URL");
                return fallback;
            }
        };

        let uploaded = self
            .client
            .post(format!("{}/invoices/{}", storage_url, order_id))
            .header("content-type", "application/pdf")
            .body(pdf)
            .send()
            .await
            .and_then(|response| response.error_for_status());

        match uploaded {
            Ok(response) => match response.json::<UploadResponse>().await {
                Ok(body) => ShareResult {
                    url: body.url,
                    uploaded: true,
                },
                Err(error) => {
                    tracing::warn!(order_id = %order_id, error = %error, "invoice upload response unreadable, sharing raw URL");
                    fallback
                }
            },
            Err(error) => {
                tracing::warn!(order_id = %order_id, error = %error, "invoice upload failed, sharing raw URL");
                fallback
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_url_points_at_renderer() {
        let service = InvoiceService::new(
            "http://invoices.internal".into(),
            None,
            Duration::from_secs(5),
        )
        .unwrap();
        let id = Uuid::new_v4();
        assert_eq!(
            service.raw_url(id),
            format!("http://invoices.internal/invoices/{}.pdf", id)
        );
    }

    #[tokio::test]
    async fn test_share_without_storage_degrades_to_raw_url() {
        let service = InvoiceService::new(
            "http://invoices.internal".into(),
            None,
            Duration::from_secs(5),
        )
        .unwrap();
        let id = Uuid::new_v4();
        let result = service.share(id).await;
        assert!(!result.uploaded);
        assert_eq!(result.url, service.raw_url(id));
    }
}
