//! Wire shapes for the P2P `adv/search` endpoint.
//!
//! Everything on the response side is optional and kept as a raw `Value`:
//! numbers arrive either as JSON numbers or as numeric strings, and an
//! unexpected type in one field must not cost the whole listing. The pipeline
//! decides which fields it cannot live without.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::types::{QueryCriteria, TradeType};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchRequest<'a> {
    pub asset: &'a str,
    pub fiat: &'a str,
    pub trade_type: TradeType,
    pub page: u32,
    pub rows: u32,
    #[serde(skip_serializing_if = "<[String]>::is_empty")]
    pub pay_types: &'a [String],
}

impl<'a> SearchRequest<'a> {
    pub fn first_page(criteria: &'a QueryCriteria) -> Self {
        Self {
            asset: &criteria.asset,
            fiat: &criteria.fiat,
            trade_type: criteria.trade_type,
            page: 1,
            rows: criteria.rows,
            pay_types: &criteria.pay_types,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct RawListing {
    pub adv: Option<RawAdv>,
    pub advertiser: Option<RawAdvertiser>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawAdv {
    pub adv_no: Option<Value>,
    pub price: Option<Value>,
    pub fiat_unit: Option<Value>,
    pub asset: Option<Value>,
    pub min_single_trans_amount: Option<Value>,
    pub max_single_trans_amount: Option<Value>,
    pub dynamic_max_single_trans_amount: Option<Value>,
    pub tradable_quantity: Option<Value>,
    /// Array of trade method objects; read element by element.
    pub trade_methods: Option<Value>,
    pub is_promoted: Option<Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawTradeMethod {
    pub trade_method_name: Option<Value>,
    pub identifier: Option<Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawAdvertiser {
    pub nick_name: Option<Value>,
    pub user_type: Option<Value>,
    pub month_order_count: Option<Value>,
    pub month_finish_rate: Option<Value>,
}

impl RawListing {
    /// Build a listing from one `data` element without ever failing.
    ///
    /// A block that is not an object comes out as `None`. An element that is
    /// not an object yields an empty listing, which normalization then counts
    /// as dropped instead of it vanishing here.
    pub fn from_value(item: &Value) -> Self {
        Self {
            adv: block(item, "adv"),
            advertiser: block(item, "advertiser"),
        }
    }
}

fn block<T: DeserializeOwned>(item: &Value, key: &str) -> Option<T> {
    let value = item.get(key).filter(|v| v.is_object())?;
    match T::deserialize(value) {
        Ok(parsed) => Some(parsed),
        Err(e) => {
            debug!(key, "unreadable listing block: {e}");
            None
        }
    }
}

/// Pull the listings out of a response body. A missing or non-array `data`
/// means "no listings".
pub fn parse_search_response(body: &Value) -> Vec<RawListing> {
    match body.get("data").and_then(|d| d.as_array()) {
        Some(items) => items.iter().map(RawListing::from_value).collect(),
        None => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn request_omits_empty_pay_types() {
        let criteria = QueryCriteria::default();
        let request = SearchRequest::first_page(&criteria);
        let body = serde_json::to_value(request).unwrap();
        assert_eq!(
            body,
            json!({"asset": "USDT", "fiat": "UAH", "tradeType": "BUY", "page": 1, "rows": 20})
        );
    }

    #[test]
    fn request_carries_pay_types_when_set() {
        let criteria = QueryCriteria {
            trade_type: TradeType::Sell,
            pay_types: vec!["Monobank".to_string(), "PrivatBank".to_string()],
            rows: 10,
            ..QueryCriteria::default()
        };
        let request = SearchRequest::first_page(&criteria);
        let body = serde_json::to_value(request).unwrap();
        assert_eq!(body["tradeType"], "SELL");
        assert_eq!(body["rows"], 10);
        assert_eq!(body["payTypes"], json!(["Monobank", "PrivatBank"]));
    }

    #[test]
    fn parses_listing_with_string_and_number_fields() {
        let body = json!({"data": [{
            "adv": {
                "advNo": "1",
                "price": "40.5",
                "tradeMethods": [{"tradeMethodName": "Monobank"}]
            },
            "advertiser": {"nickName": "Bob", "monthOrderCount": 120}
        }]});
        let listings = parse_search_response(&body);
        assert_eq!(listings.len(), 1);
        let adv = listings[0].adv.as_ref().unwrap();
        assert_eq!(adv.price, Some(json!("40.5")));
        assert_eq!(
            adv.trade_methods.as_ref().unwrap()[0]["tradeMethodName"],
            json!("Monobank")
        );
        let advertiser = listings[0].advertiser.as_ref().unwrap();
        assert_eq!(advertiser.month_order_count, Some(json!(120)));
    }

    #[test]
    fn non_array_data_yields_nothing() {
        assert!(parse_search_response(&json!({"data": null})).is_empty());
        assert!(parse_search_response(&json!({"code": "000002"})).is_empty());
        assert!(parse_search_response(&json!([])).is_empty());
    }

    #[test]
    fn garbage_elements_become_empty_listings() {
        let body = json!({"data": [42, "nope", {"adv": {"price": "1"}}]});
        let listings = parse_search_response(&body);
        assert_eq!(listings.len(), 3);
        assert!(listings[0].adv.is_none());
        assert!(listings[1].adv.is_none());
        assert!(listings[2].adv.is_some());
    }

    #[test]
    fn odd_optional_types_keep_the_listing() {
        let body = json!({"data": [
            {"adv": {"price": "1", "isPromoted": "false", "fiatUnit": 980}},
            {
                "adv": {"price": "2", "tradeMethods": "Monobank"},
                "advertiser": {"nickName": 12345}
            },
            {"adv": "not a block", "advertiser": []}
        ]});
        let listings = parse_search_response(&body);
        assert_eq!(listings.len(), 3);
        assert_eq!(
            listings[0].adv.as_ref().unwrap().is_promoted,
            Some(json!("false"))
        );
        assert_eq!(
            listings[1].advertiser.as_ref().unwrap().nick_name,
            Some(json!(12345))
        );
        assert!(listings[2].adv.is_none());
        assert!(listings[2].advertiser.is_none());
    }
}
