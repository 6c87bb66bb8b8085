//! Thin REST client for an Alpaca-style paper trading API

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::broker::{
    Account, Broker, BrokerError, BrokerPosition, OrderRef, OrderRequest, OrderSide, OrderType,
    TimeInForce,
};

/// HTTP implementation of the `Broker` contract. Carries no business logic;
/// all risk and sequencing decisions happen before a request reaches here.
pub struct AlpacaBroker {
    client: Client,
    base_url: String,
    api_key: String,
    api_secret: String,
}

impl AlpacaBroker {
    pub fn new(base_url: &str, api_key: &str, api_secret: &str) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            api_secret: api_secret.to_string(),
        })
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        self.client
            .request(method, url)
            .header("APCA-API-KEY-ID", &self.api_key)
            .header("APCA-API-SECRET-KEY", &self.api_secret)
    }

    async fn error_from(response: reqwest::Response) -> BrokerError {
        let status = response.status().as_u16();
        let message = response.text().await.unwrap_or_default();
        BrokerError::Api { status, message }
    }
}

#[async_trait]
impl Broker for AlpacaBroker {
    async fn place_order(&self, req: &OrderRequest) -> Result<OrderRef, BrokerError> {
        let body = PlaceOrderRequest {
            symbol: req.symbol.clone(),
            qty: req.qty.to_string(),
            side: req.side,
            order_type: req.order_type,
            time_in_force: req.time_in_force,
            client_order_id: req.client_order_id.clone(),
            extended_hours: req.extended_hours,
            limit_price: req.limit_price.map(|p| p.to_string()),
        };

        debug!(symbol = %req.symbol, client_order_id = %req.client_order_id, "placing order");

        let response = self
            .request(reqwest::Method::POST, "/v2/orders")
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::error_from(response).await);
        }

        let order: OrderResponse = response.json().await?;
        Ok(OrderRef {
            id: order.id,
            client_order_id: order.client_order_id,
            status: order.status,
        })
    }

    async fn open_orders(&self) -> Result<Vec<OrderRef>, BrokerError> {
        let response = self
            .request(reqwest::Method::GET, "/v2/orders")
            .query(&[("status", "open")])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::error_from(response).await);
        }

        let orders: Vec<OrderResponse> = response.json().await?;
        Ok(orders
            .into_iter()
            .map(|order| OrderRef {
                id: order.id,
                client_order_id: order.client_order_id,
                status: order.status,
            })
            .collect())
    }

    async fn position(&self, symbol: &str) -> Result<BrokerPosition, BrokerError> {
        let response = self
            .request(reqwest::Method::GET, &format!("/v2/positions/{symbol}"))
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(BrokerError::PositionNotFound);
        }
        if !response.status().is_success() {
            return Err(Self::error_from(response).await);
        }

        let position: PositionResponse = response.json().await?;
        let qty: i64 = position
            .qty
            .parse()
            .map_err(|e| BrokerError::Parse(format!("position qty: {e}")))?;
        let avg_entry: Decimal = position
            .avg_entry_price
            .parse()
            .map_err(|e| BrokerError::Parse(format!("avg entry price: {e}")))?;

        Ok(BrokerPosition {
            symbol: position.symbol,
            qty,
            avg_entry,
        })
    }

    async fn account(&self) -> Result<Account, BrokerError> {
        let response = self.request(reqwest::Method::GET, "/v2/account").send().await?;

        if !response.status().is_success() {
            return Err(Self::error_from(response).await);
        }

        let account: AccountResponse = response.json().await?;
        let equity: Decimal = account
            .equity
            .parse()
            .map_err(|e| BrokerError::Parse(format!("equity: {e}")))?;
        let buying_power: Decimal = account
            .buying_power
            .parse()
            .map_err(|e| BrokerError::Parse(format!("buying power: {e}")))?;

        Ok(Account {
            equity,
            buying_power,
        })
    }
}

// Wire types. Alpaca encodes numbers as strings.

#[derive(Debug, Serialize)]
struct PlaceOrderRequest {
    symbol: String,
    qty: String,
    side: OrderSide,
    #[serde(rename = "type")]
    order_type: OrderType,
    time_in_force: TimeInForce,
    client_order_id: String,
    extended_hours: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    limit_price: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OrderResponse {
    id: String,
    client_order_id: String,
    status: String,
}

#[derive(Debug, Deserialize)]
struct PositionResponse {
    symbol: String,
    qty: String,
    avg_entry_price: String,
}

#[derive(Debug, Deserialize)]
struct AccountResponse {
    equity: String,
    buying_power: String,
}
