use std::sync::Arc;

use log::*;
use reqwest::{Client, Method};
use serde::{de::DeserializeOwned, Serialize};

use crate::{
    config::RazorpayConfig,
    helpers::extract_upi_uri,
    Collection,
    NewOrder,
    NewQrCode,
    Order,
    Payment,
    QrCode,
    RazorpayApiError,
};

#[derive(Clone)]
pub struct RazorpayApi {
    config: RazorpayConfig,
    client: Arc<Client>,
}

impl RazorpayApi {
    pub fn new(config: RazorpayConfig) -> Result<Self, RazorpayApiError> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(20))
            .build()
            .map_err(|e| RazorpayApiError::Initialization(e.to_string()))?;
        Ok(Self { config, client: Arc::new(client) })
    }

    pub fn key_id(&self) -> &str {
        &self.config.key_id
    }

    pub fn config(&self) -> &RazorpayConfig {
        &self.config
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.config.api_url)
    }

    pub async fn rest_query<T: DeserializeOwned, B: Serialize>(
        &self,
        method: Method,
        path: &str,
        body: Option<B>,
    ) -> Result<T, RazorpayApiError> {
        let url = self.url(path);
        trace!("💳️ Sending REST query: {method} {url}");
        let mut req =
            self.client.request(method, url).basic_auth(&self.config.key_id, Some(self.config.key_secret.reveal()));
        if let Some(body) = body {
            req = req.json(&body);
        }
        let response = req.send().await.map_err(|e| RazorpayApiError::RestResponseError(e.to_string()))?;
        if response.status().is_success() {
            trace!("💳️ REST query successful. {}", response.status());
            response.json::<T>().await.map_err(|e| RazorpayApiError::JsonError(e.to_string()))
        } else {
            let status = response.status().as_u16();
            let message = response.text().await.map_err(|e| RazorpayApiError::RestResponseError(e.to_string()))?;
            Err(RazorpayApiError::QueryError { status, message })
        }
    }

    pub async fn create_order(&self, order: NewOrder) -> Result<Order, RazorpayApiError> {
        debug!("💳️ Creating order for {} (receipt {})", order.amount, order.receipt);
        let result = self.rest_query::<Order, NewOrder>(Method::POST, "/orders", Some(order)).await?;
        info!("💳️ Created order {}", result.id);
        Ok(result)
    }

    pub async fn create_qr_code(&self, qr: NewQrCode) -> Result<QrCode, RazorpayApiError> {
        debug!("💳️ Creating {} QR code for {}", qr.usage, qr.payment_amount);
        let result = self.rest_query::<QrCode, NewQrCode>(Method::POST, "/payments/qr_codes", Some(qr)).await?;
        info!("💳️ Created QR code {}", result.id);
        Ok(result)
    }

    pub async fn fetch_order_payments(&self, order_id: &str) -> Result<Collection<Payment>, RazorpayApiError> {
        let path = format!("/orders/{order_id}/payments");
        trace!("💳️ Fetching payments for order {order_id}");
        self.rest_query::<Collection<Payment>, ()>(Method::GET, &path, None).await
    }

    pub async fn fetch_qr_code_payments(&self, qr_id: &str) -> Result<Collection<Payment>, RazorpayApiError> {
        let path = format!("/payments/qr_codes/{qr_id}/payments");
        trace!("💳️ Fetching payments for QR code {qr_id}");
        self.rest_query::<Collection<Payment>, ()>(Method::GET, &path, None).await
    }

    pub async fn fetch_payment(&self, payment_id: &str) -> Result<Payment, RazorpayApiError> {
        let path = format!("/payments/{payment_id}");
        trace!("💳️ Fetching payment {payment_id}");
        self.rest_query::<Payment, ()>(Method::GET, &path, None).await
    }

    /// Fetches the hosted QR image page and looks for the UPI intent URI behind it. Returns `None` on any failure.
    pub async fn resolve_upi_uri(&self, image_url: &str) -> Option<String> {
        let response = match self.client.get(image_url).send().await {
            Ok(r) if r.status().is_success() => r,
            Ok(r) => {
                debug!("💳️ QR page {image_url} returned {}", r.status());
                return None;
            },
            Err(e) => {
                debug!("💳️ Could not fetch QR page {image_url}. {e}");
                return None;
            },
        };
        let html = response.text().await.ok()?;
        let uri = extract_upi_uri(&html);
        if uri.is_none() {
            debug!("💳️ No UPI URI found on QR page {image_url}");
        }
        uri
    }
}
