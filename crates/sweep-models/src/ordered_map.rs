use indexmap::IndexMap;

/// String-keyed map that keeps document insertion order.
///
/// Symbol maps and per-symbol legacy maps are rendered in the order the
/// upstream wrote them, so a sorted map would reorder datasets. Replacing a
/// key keeps its original position.
pub type OrderedMap<V> = IndexMap<String, V>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_document_order() {
        let map: OrderedMap<u32> = serde_json::from_str(r#"{"SPY": 1, "QQQ": 2, "NDX": 3}"#).unwrap();
        let keys: Vec<&str> = map.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["SPY", "QQQ", "NDX"]);
        assert_eq!(serde_json::to_string(&map).unwrap(), r#"{"SPY":1,"QQQ":2,"NDX":3}"#);
    }

    #[test]
    fn replace_keeps_position() {
        let mut map = OrderedMap::new();
        map.insert("a".to_string(), 1);
        map.insert("b".to_string(), 2);
        assert_eq!(map.insert("a".to_string(), 10), Some(1));
        let entries: Vec<(&str, &i32)> = map.iter().map(|(k, v)| (k.as_str(), v)).collect();
        assert_eq!(entries, vec![("a", &10), ("b", &2)]);
    }
}
