use std::cmp::Ordering;

use crate::types::{AdRecord, SortDirection, SortKey};

fn sort_value(record: &AdRecord, key: SortKey) -> f64 {
    match key {
        SortKey::Price => record.price,
        SortKey::Amount => record.max_fiat,
        SortKey::Merchant => {
            if record.is_merchant {
                1.0
            } else {
                0.0
            }
        }
        SortKey::Completion => record.month_finish_rate.unwrap_or(0.0),
        SortKey::Orders => record.month_order_count.unwrap_or(0.0),
    }
}

/// Returns a new, ordered copy. Ties keep their arrival order in both directions.
pub fn sort_records(records: &[AdRecord], key: SortKey, direction: SortDirection) -> Vec<AdRecord> {
    let mut sorted = records.to_vec();
    sorted.sort_by(|a, b| {
        let ord: Ordering = sort_value(a, key).total_cmp(&sort_value(b, key));
        match direction {
            SortDirection::Asc => ord,
            SortDirection::Desc => ord.reverse(),
        }
    });
    sorted
}

#[cfg(test)]
mod tests {
    use super::*;
    use SortDirection::{Asc, Desc};

    fn rec(
        id: &str,
        price: f64,
        max_fiat: f64,
        merchant: bool,
        rate: Option<f64>,
        orders: Option<f64>,
    ) -> AdRecord {
        AdRecord {
            id: id.to_string(),
            price,
            fiat: "UAH".to_string(),
            asset: "USDT".to_string(),
            min_fiat: 100.0,
            max_fiat,
            available_asset: 10.0,
            pay_methods: vec!["Monobank".to_string()],
            seller_name: id.to_string(),
            is_merchant: merchant,
            month_order_count: orders,
            month_finish_rate: rate,
            is_promoted: false,
        }
    }

    fn order(records: &[AdRecord], key: SortKey, direction: SortDirection) -> Vec<String> {
        sort_records(records, key, direction)
            .into_iter()
            .map(|r| r.id)
            .collect()
    }

    fn book() -> Vec<AdRecord> {
        vec![
            rec("a", 41.2, 5000.0, false, Some(0.91), Some(40.0)),
            rec("b", 40.8, 20000.0, true, Some(0.99), Some(900.0)),
            rec("c", 41.0, 1000.0, true, None, None),
            rec("d", 40.9, 8000.0, false, Some(0.95), Some(12.0)),
        ]
    }

    #[test]
    fn sorts_by_each_key() {
        let records = book();
        assert_eq!(order(&records, SortKey::Price, Asc), ["b", "d", "c", "a"]);
        assert_eq!(order(&records, SortKey::Price, Desc), ["a", "c", "d", "b"]);
        assert_eq!(order(&records, SortKey::Amount, Desc), ["b", "d", "a", "c"]);
        assert_eq!(order(&records, SortKey::Completion, Asc), ["c", "a", "d", "b"]);
        assert_eq!(order(&records, SortKey::Orders, Desc), ["b", "a", "d", "c"]);
    }

    #[test]
    fn merchant_key_is_stable_within_groups() {
        let records = book();
        assert_eq!(order(&records, SortKey::Merchant, Desc), ["b", "c", "a", "d"]);
        assert_eq!(order(&records, SortKey::Merchant, Asc), ["a", "d", "b", "c"]);
    }

    #[test]
    fn equal_keys_preserve_original_order() {
        let records: Vec<AdRecord> = ["e", "f", "g", "h", "i"]
            .iter()
            .map(|id| rec(id, 40.0, 1000.0, false, None, None))
            .collect();
        let keys = [
            SortKey::Price,
            SortKey::Amount,
            SortKey::Merchant,
            SortKey::Completion,
            SortKey::Orders,
        ];
        for key in keys {
            for dir in [Asc, Desc] {
                assert_eq!(order(&records, key, dir), ["e", "f", "g", "h", "i"]);
            }
        }
    }

    #[test]
    fn sorting_twice_changes_nothing() {
        let records = book();
        for dir in [Asc, Desc] {
            let once = sort_records(&records, SortKey::Price, dir);
            let twice = sort_records(&once, SortKey::Price, dir);
            assert_eq!(once, twice);
        }
    }

    #[test]
    fn input_is_left_untouched() {
        let records = book();
        let before = records.clone();
        let _ = sort_records(&records, SortKey::Price, Desc);
        assert_eq!(records, before);
    }
}
