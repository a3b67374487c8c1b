//! HTTP client for the orderdesk dashboard API.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder};
use rust_decimal::Decimal;
use serde::Serialize;
use serde::de::DeserializeOwned;

use orderdesk_core::{ItemId, LineItem, OrderId, OrderSummary, ProductId, UnitId};
use orderdesk_flow::api::{
    ExistenceQuery, ExistenceResponse, NewOrder, NewOrderLine, OrderApi, OrderListQuery,
    OrderListRow,
};
use orderdesk_flow::error::{Error, Result as FlowResult};
use orderdesk_flow::items::reconciler::ItemChanges;

use crate::Config;

/// [`OrderApi`] over the dashboard REST endpoints.
///
/// Every failure, including non-success statuses, surfaces as
/// [`Error::Transport`].
#[derive(Debug, Clone)]
pub struct HttpOrderApi {
    client: Client,
    base_url: String,
    token: Option<String>,
}

/// Item fields under the names the order-items endpoints use.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ItemBody<'a> {
    product_id: ProductId,
    unit_measurement_id: UnitId,
    quantity: Decimal,
    price: Decimal,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<&'a str>,
}

impl<'a> From<&'a LineItem> for ItemBody<'a> {
    fn from(item: &'a LineItem) -> Self {
        Self {
            product_id: item.product_id,
            unit_measurement_id: item.unit_id,
            quantity: item.quantity,
            price: item.unit_cost,
            description: item.description.as_deref(),
        }
    }
}

/// Body of `POST /order-items`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct NewItemRequest<'a> {
    order_id: OrderId,
    #[serde(flatten)]
    item: ItemBody<'a>,
}

/// Body of `PATCH /order-items/{id}`. `description: Some(None)` sends `null`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ItemPatch<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    product_id: Option<ProductId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    unit_measurement_id: Option<UnitId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    quantity: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    price: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<Option<&'a str>>,
}

impl<'a> From<&'a ItemChanges> for ItemPatch<'a> {
    fn from(changes: &'a ItemChanges) -> Self {
        Self {
            product_id: changes.product_id,
            unit_measurement_id: changes.unit_id,
            quantity: changes.quantity,
            price: changes.unit_cost,
            description: changes.description.as_ref().map(Option::as_deref),
        }
    }
}

/// Body of `POST /orders/{id}/items`.
#[derive(Debug, Serialize)]
struct AppendItemsRequest<'a> {
    items: &'a [NewOrderLine],
}

impl HttpOrderApi {
    /// Creates a new API client from configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn new(config: &Config) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url: config.api_url.clone(),
            token: config.api_token.clone(),
        })
    }

    /// Returns the base URL requests are sent to.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}{path}", self.base_url);
        let req = self.client.request(method, url);
        match &self.token {
            Some(token) => req.bearer_auth(token),
            None => req,
        }
    }

    async fn send(&self, req: RequestBuilder) -> FlowResult<reqwest::Response> {
        let response = req
            .send()
            .await
            .map_err(|err| Error::transport_with_source("Failed to send request", err))?;

        if response.status().is_success() {
            Ok(response)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(Error::transport(format!("API error ({status}): {body}")))
        }
    }

    async fn send_json<T: DeserializeOwned>(&self, req: RequestBuilder) -> FlowResult<T> {
        self.send(req)
            .await?
            .json()
            .await
            .map_err(|err| Error::transport_with_source("Failed to parse response", err))
    }
}

#[async_trait]
impl OrderApi for HttpOrderApi {
    async fn probe_existence(&self, query: &ExistenceQuery) -> FlowResult<ExistenceResponse> {
        self.send_json(self.request(Method::GET, "/orders/exists").query(query))
            .await
    }

    async fn list_orders(&self, query: &OrderListQuery) -> FlowResult<Vec<OrderListRow>> {
        self.send_json(self.request(Method::GET, "/orders").query(query))
            .await
    }

    async fn create_order(&self, order: &NewOrder) -> FlowResult<OrderSummary> {
        self.send_json(self.request(Method::POST, "/orders").json(order))
            .await
    }

    async fn append_order_items(
        &self,
        order_id: OrderId,
        items: &[NewOrderLine],
    ) -> FlowResult<OrderSummary> {
        let path = format!("/orders/{order_id}/items");
        self.send_json(
            self.request(Method::POST, &path)
                .json(&AppendItemsRequest { items }),
        )
        .await
    }

    async fn create_item(&self, parent_id: OrderId, item: &LineItem) -> FlowResult<LineItem> {
        let body = NewItemRequest {
            order_id: parent_id,
            item: ItemBody::from(item),
        };
        self.send_json(self.request(Method::POST, "/order-items").json(&body))
            .await
    }

    async fn update_item(&self, item_id: ItemId, changes: &ItemChanges) -> FlowResult<LineItem> {
        let path = format!("/order-items/{item_id}");
        self.send_json(
            self.request(Method::PATCH, &path)
                .json(&ItemPatch::from(changes)),
        )
            .await
    }

    async fn delete_item(&self, item_id: ItemId) -> FlowResult<()> {
        let path = format!("/order-items/{item_id}");
        self.send(self.request(Method::DELETE, &path)).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_keeps_configured_base_url() {
        let config = Config {
            api_url: "https://orders.example.com/api".to_string(),
            ..Config::default()
        };
        let api = HttpOrderApi::new(&config).unwrap();
        assert_eq!(api.base_url(), "https://orders.example.com/api");
    }

    #[test]
    fn new_item_body_uses_backend_names() {
        let item = LineItem::new(ProductId::new(9), UnitId::new(3), Decimal::ONE, Decimal::TEN)
            .with_id(ItemId::new(12));
        let body = serde_json::to_value(NewItemRequest {
            order_id: OrderId::new(40),
            item: ItemBody::from(&item),
        })
        .unwrap();
        assert_eq!(body["orderId"], 40);
        assert_eq!(body["productId"], 9);
        assert_eq!(body["unitMeasurementId"], 3);
        assert!(body.get("price").is_some());
        assert!(body.get("unitCost").is_none());
        assert!(body.get("unitId").is_none());
        assert!(body.get("id").is_none());
    }

    #[test]
    fn item_patch_renames_and_keeps_cleared_description() {
        let changes = ItemChanges {
            unit_id: Some(UnitId::new(4)),
            unit_cost: Some(Decimal::TWO),
            description: Some(None),
            ..ItemChanges::default()
        };
        let body = serde_json::to_value(ItemPatch::from(&changes)).unwrap();
        let object = body.as_object().unwrap();
        let mut keys: Vec<&str> = object.keys().map(String::as_str).collect();
        keys.sort_unstable();
        assert_eq!(keys, vec!["description", "price", "unitMeasurementId"]);
        assert!(object["description"].is_null());
    }

    #[tokio::test]
    async fn unreachable_backend_is_a_transport_error() {
        let config = Config {
            api_url: "http://127.0.0.1:9".to_string(),
            timeout: std::time::Duration::from_secs(2),
            ..Config::default()
        };
        let api = HttpOrderApi::new(&config).unwrap();
        let err = api.delete_item(ItemId::new(1)).await.unwrap_err();
        assert!(matches!(err, Error::Transport { .. }));
    }
}
