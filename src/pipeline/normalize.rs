use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::config::MERCHANT_USER_TYPE;
use crate::error::TransformError;
use crate::gateway::messages::{RawAdvertiser, RawListing, RawTradeMethod};
use crate::types::{AdRecord, QueryCriteria};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct NormalizeStats {
    pub input: usize,
    pub dropped_malformed: usize,
    pub filtered_amount: usize,
    pub filtered_merchant: usize,
    pub kept: usize,
}

/// Turn one page of raw listings into records, then apply the local filters.
///
/// Price and both transaction limits are required; a listing missing any of
/// them is dropped on its own and the rest of the page goes through.
pub fn normalize(raw: &[RawListing], criteria: &QueryCriteria) -> (Vec<AdRecord>, NormalizeStats) {
    let mut stats = NormalizeStats {
        input: raw.len(),
        ..NormalizeStats::default()
    };
    let mut records = Vec::with_capacity(raw.len());

    for (index, listing) in raw.iter().enumerate() {
        let record = match to_record(listing, index, criteria) {
            Ok(r) => r,
            Err(e) => {
                debug!(index, "dropping listing: {e}");
                stats.dropped_malformed += 1;
                continue;
            }
        };

        if !overlaps_amount_window(&record, criteria.amount_min, criteria.amount_max) {
            stats.filtered_amount += 1;
            continue;
        }
        if criteria.merchant_only && !record.is_merchant {
            stats.filtered_merchant += 1;
            continue;
        }
        records.push(record);
    }

    stats.kept = records.len();
    (records, stats)
}

/// The record's tradable window must overlap `[min, max]`; containment is not required.
pub fn overlaps_amount_window(record: &AdRecord, min: Option<f64>, max: Option<f64>) -> bool {
    min.map_or(true, |lo| record.max_fiat >= lo) && max.map_or(true, |hi| record.min_fiat <= hi)
}

pub fn to_record(
    listing: &RawListing,
    index: usize,
    criteria: &QueryCriteria,
) -> Result<AdRecord, TransformError> {
    let adv = listing.adv.as_ref().ok_or(TransformError::MissingAdv)?;

    let price = required_number("price", adv.price.as_ref())?;
    let min_fiat = required_number(
        "minSingleTransAmount",
        adv.min_single_trans_amount.as_ref(),
    )?;
    let dynamic_max = adv
        .dynamic_max_single_trans_amount
        .as_ref()
        .and_then(coerce_number);
    let max_fiat = match dynamic_max {
        Some(dynamic) => dynamic,
        None => required_number(
            "maxSingleTransAmount",
            adv.max_single_trans_amount.as_ref(),
        )?,
    };

    let id = text(adv.adv_no.as_ref()).unwrap_or_else(|| format!("#{index}"));
    let advertiser = listing.advertiser.clone().unwrap_or_default();

    Ok(AdRecord {
        id,
        price,
        fiat: text(adv.fiat_unit.as_ref()).unwrap_or_else(|| criteria.fiat.clone()),
        asset: text(adv.asset.as_ref()).unwrap_or_else(|| criteria.asset.clone()),
        min_fiat,
        max_fiat,
        available_asset: adv
            .tradable_quantity
            .as_ref()
            .and_then(coerce_number)
            .unwrap_or(0.0),
        pay_methods: pay_methods(adv.trade_methods.as_ref()),
        seller_name: text(advertiser.nick_name.as_ref()).unwrap_or_default(),
        is_merchant: is_merchant(&advertiser),
        month_order_count: advertiser
            .month_order_count
            .as_ref()
            .and_then(coerce_number),
        month_finish_rate: advertiser
            .month_finish_rate
            .as_ref()
            .and_then(coerce_number)
            .filter(|r| (0.0..=1.0).contains(r)),
        is_promoted: flag(adv.is_promoted.as_ref()),
    })
}

fn required_number(field: &'static str, v: Option<&Value>) -> Result<f64, TransformError> {
    let v = match v {
        None | Some(Value::Null) => return Err(TransformError::MissingField(field)),
        Some(v) => v,
    };
    coerce_number(v).ok_or_else(|| TransformError::Malformed {
        field,
        value: v.to_string(),
    })
}

/// JSON number or numeric string; anything non-finite is rejected.
fn coerce_number(v: &Value) -> Option<f64> {
    v.as_f64()
        .or_else(|| v.as_str().and_then(|s| s.trim().parse::<f64>().ok()))
        .filter(|n| n.is_finite())
}

/// Non-empty string, or a number rendered as text.
fn text(v: Option<&Value>) -> Option<String> {
    match v? {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// `true`, `"true"` or a non-zero number; anything else is false.
fn flag(v: Option<&Value>) -> bool {
    match v {
        Some(Value::Bool(b)) => *b,
        Some(Value::String(s)) => s.trim().eq_ignore_ascii_case("true"),
        Some(Value::Number(n)) => n.as_f64().is_some_and(|n| n != 0.0),
        _ => false,
    }
}

fn pay_methods(methods: Option<&Value>) -> Vec<String> {
    let Some(methods) = methods.and_then(Value::as_array) else {
        return Vec::new();
    };
    methods
        .iter()
        .filter_map(|m| RawTradeMethod::deserialize(m).ok())
        .filter_map(|m| {
            let name = text(m.trade_method_name.as_ref());
            name.or_else(|| text(m.identifier.as_ref()))
        })
        .collect()
}

fn is_merchant(advertiser: &RawAdvertiser) -> bool {
    advertiser.user_type.as_ref().and_then(Value::as_str) == Some(MERCHANT_USER_TYPE)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::messages::parse_search_response;
    use serde_json::json;

    fn listing(price: &str, min: &str, max: &str) -> Value {
        json!({
            "adv": {
                "advNo": format!("ad-{price}"),
                "price": price,
                "fiatUnit": "UAH",
                "asset": "USDT",
                "minSingleTransAmount": min,
                "maxSingleTransAmount": max,
                "tradableQuantity": "100",
                "tradeMethods": []
            },
            "advertiser": {"nickName": "seller", "userType": "user"}
        })
    }

    fn page(items: Vec<Value>) -> Vec<RawListing> {
        parse_search_response(&json!({ "data": items }))
    }

    fn run(raw: &[RawListing]) -> (Vec<AdRecord>, NormalizeStats) {
        normalize(raw, &QueryCriteria::default())
    }

    #[test]
    fn reference_response_normalizes_to_one_record() {
        let body = json!({"data": [{
            "adv": {
                "advNo": "1",
                "price": "40.5",
                "fiatUnit": "UAH",
                "asset": "USDT",
                "minSingleTransAmount": "500",
                "maxSingleTransAmount": "20000",
                "tradableQuantity": "1000",
                "tradeMethods": [{"tradeMethodName": "Monobank"}]
            },
            "advertiser": {
                "nickName": "Bob",
                "userType": "merchant",
                "monthOrderCount": 120,
                "monthFinishRate": 0.97
            }
        }]});
        let (records, stats) = run(&parse_search_response(&body));

        assert_eq!(records.len(), 1);
        assert_eq!(stats.kept, 1);
        let r = &records[0];
        assert_eq!(r.id, "1");
        assert_eq!(r.price, 40.5);
        assert_eq!(r.min_fiat, 500.0);
        assert_eq!(r.max_fiat, 20000.0);
        assert_eq!(r.available_asset, 1000.0);
        assert!(r.is_merchant);
        assert_eq!(r.pay_methods, vec!["Monobank".to_string()]);
        assert_eq!(r.seller_name, "Bob");
        assert_eq!(r.month_order_count, Some(120.0));
        assert_eq!(r.month_finish_rate, Some(0.97));
        assert!(!r.is_promoted);
    }

    #[test]
    fn well_formed_input_yields_one_record_per_listing() {
        let items = (1..=7)
            .map(|i| listing(&format!("{}.0", 40 + i), "100", "5000"))
            .collect();
        let (records, stats) = run(&page(items));
        assert_eq!(records.len(), 7);
        assert_eq!(stats.dropped_malformed, 0);
        let prices: Vec<f64> = records.iter().map(|r| r.price).collect();
        assert_eq!(prices, vec![41.0, 42.0, 43.0, 44.0, 45.0, 46.0, 47.0]);
    }

    #[test]
    fn odd_optional_values_never_cost_a_listing() {
        let mut promoted_as_text = listing("40", "100", "5000");
        promoted_as_text["adv"]["isPromoted"] = json!("false");
        let mut numeric_identifier = listing("41", "100", "5000");
        numeric_identifier["adv"]["tradeMethods"] = json!([{"identifier": 7}]);
        let mut numeric_nick = listing("42", "100", "5000");
        numeric_nick["advertiser"]["nickName"] = json!(12345);
        let mut scrambled = listing("43", "100", "5000");
        scrambled["adv"]["fiatUnit"] = json!(["UAH"]);
        scrambled["adv"]["tradeMethods"] = json!("Monobank");
        scrambled["advertiser"] = json!("anonymous");

        let raw = page(vec![
            promoted_as_text,
            numeric_identifier,
            numeric_nick,
            scrambled,
        ]);
        let (records, stats) = run(&raw);

        assert_eq!(records.len(), 4);
        assert_eq!(stats.input, 4);
        assert_eq!(stats.dropped_malformed, 0);
        assert!(!records[0].is_promoted);
        assert_eq!(records[1].pay_methods, vec!["7".to_string()]);
        assert_eq!(records[2].seller_name, "12345");
        assert_eq!(records[3].fiat, "UAH");
        assert!(records[3].pay_methods.is_empty());
        assert_eq!(records[3].seller_name, "");
    }

    #[test]
    fn promoted_flag_accepts_loose_encodings() {
        for (value, expected) in [
            (json!(true), true),
            (json!("TRUE"), true),
            (json!(1), true),
            (json!("false"), false),
            (json!(0), false),
            (json!(null), false),
        ] {
            let mut item = listing("40", "100", "5000");
            item["adv"]["isPromoted"] = value.clone();
            let (records, _) = run(&page(vec![item]));
            assert_eq!(records[0].is_promoted, expected, "isPromoted = {value}");
        }
    }

    #[test]
    fn unreadable_elements_are_counted_as_dropped() {
        let raw = page(vec![
            json!(42),
            listing("40", "100", "5000"),
            json!({"adv": "broken"}),
        ]);
        let (records, stats) = run(&raw);
        assert_eq!(records.len(), 1);
        assert_eq!(stats.input, 3);
        assert_eq!(stats.dropped_malformed, 2);
    }

    #[test]
    fn malformed_listing_is_dropped_without_breaking_the_page() {
        let mut bad_price = listing("40", "100", "5000");
        bad_price["adv"]["price"] = json!("n/a");
        let mut no_min = listing("41", "100", "5000");
        no_min["adv"]
            .as_object_mut()
            .unwrap()
            .remove("minSingleTransAmount");
        let no_adv = json!({"advertiser": {"nickName": "ghost"}});

        let raw = page(vec![bad_price, listing("42", "100", "5000"), no_min, no_adv]);
        let (records, stats) = run(&raw);

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].price, 42.0);
        assert_eq!(stats.dropped_malformed, 3);
        assert_eq!(stats.input, 4);
    }

    #[test]
    fn required_field_errors_name_the_field() {
        let mut no_price = listing("40", "100", "5000");
        no_price["adv"]["price"] = Value::Null;
        let raw = page(vec![no_price]);
        assert_eq!(
            to_record(&raw[0], 0, &QueryCriteria::default()),
            Err(TransformError::MissingField("price"))
        );

        let mut nan_max = listing("40", "100", "5000");
        nan_max["adv"]["maxSingleTransAmount"] = json!("NaN");
        let raw = page(vec![nan_max]);
        assert!(matches!(
            to_record(&raw[0], 0, &QueryCriteria::default()),
            Err(TransformError::Malformed {
                field: "maxSingleTransAmount",
                ..
            })
        ));
    }

    #[test]
    fn dynamic_upper_limit_wins_over_static() {
        let mut item = listing("40", "100", "5000");
        item["adv"]["dynamicMaxSingleTransAmount"] = json!("3200.50");
        let (records, _) = run(&page(vec![item]));
        assert_eq!(records[0].max_fiat, 3200.5);

        let mut null_dynamic = listing("40", "100", "5000");
        null_dynamic["adv"]["dynamicMaxSingleTransAmount"] = Value::Null;
        let (records, _) = run(&page(vec![null_dynamic]));
        assert_eq!(records[0].max_fiat, 5000.0);
    }

    #[test]
    fn optional_fields_fall_back_quietly() {
        let body = json!({"data": [{"adv": {
            "price": 39.9,
            "minSingleTransAmount": 100,
            "maxSingleTransAmount": 900,
            "tradeMethods": [
                {"identifier": "PrivatBank"},
                {"tradeMethodName": "", "identifier": "ABank"},
                {}
            ]
        }}]});
        let (records, _) = run(&parse_search_response(&body));
        let r = &records[0];
        assert_eq!(r.id, "#0");
        assert_eq!(r.fiat, "UAH");
        assert_eq!(r.asset, "USDT");
        assert_eq!(r.available_asset, 0.0);
        assert_eq!(
            r.pay_methods,
            vec!["PrivatBank".to_string(), "ABank".to_string()]
        );
        assert!(!r.is_merchant);
        assert_eq!(r.seller_name, "");
        assert_eq!(r.month_order_count, None);
        assert_eq!(r.month_finish_rate, None);
    }

    #[test]
    fn out_of_range_finish_rate_is_treated_as_absent() {
        let mut item = listing("40", "100", "5000");
        item["advertiser"]["monthFinishRate"] = json!(1.7);
        let (records, _) = run(&page(vec![item]));
        assert_eq!(records[0].month_finish_rate, None);
    }

    #[test]
    fn amount_filter_uses_overlap_not_containment() {
        // windows: [100, 1000], [2000, 5000], [500, 20000]
        let raw = page(vec![
            listing("40", "100", "1000"),
            listing("41", "2000", "5000"),
            listing("42", "500", "20000"),
        ]);
        let criteria = QueryCriteria {
            amount_min: Some(900.0),
            amount_max: Some(1500.0),
            ..QueryCriteria::default()
        };
        let (records, stats) = normalize(&raw, &criteria);
        let prices: Vec<f64> = records.iter().map(|r| r.price).collect();
        assert_eq!(prices, vec![40.0, 42.0]);
        assert_eq!(stats.filtered_amount, 1);
    }

    #[test]
    fn overlap_predicate_matches_bounds() {
        let raw = page(vec![listing("40", "500", "1000")]);
        let r = to_record(&raw[0], 0, &QueryCriteria::default()).unwrap();

        for (lo, hi, expected) in [
            (None, None, true),
            (Some(1000.0), None, true),
            (Some(1000.01), None, false),
            (None, Some(500.0), true),
            (None, Some(499.99), false),
            (Some(0.0), Some(10_000.0), true),
            (Some(600.0), Some(700.0), true),
        ] {
            assert_eq!(
                overlaps_amount_window(&r, lo, hi),
                expected,
                "bounds {lo:?}..{hi:?}"
            );
        }
    }

    #[test]
    fn merchant_only_drops_individuals() {
        let mut merchant = listing("40", "100", "5000");
        merchant["advertiser"]["userType"] = json!("merchant");
        let raw = page(vec![listing("39", "100", "5000"), merchant]);
        let criteria = QueryCriteria {
            merchant_only: true,
            ..QueryCriteria::default()
        };
        let (records, stats) = normalize(&raw, &criteria);
        assert_eq!(records.len(), 1);
        assert!(records[0].is_merchant);
        assert_eq!(stats.filtered_merchant, 1);
    }
}
