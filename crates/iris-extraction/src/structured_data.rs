//! JSON-LD and Schema.org microdata extraction.

use std::collections::BTreeSet;

use iris_types::model::StructuredData;
use scraper::{ElementRef, Html, Selector};
use serde_json::Value;

pub fn extract_structured_data(document: &Html) -> StructuredData {
    let json_ld = extract_json_ld(document);
    let microdata = extract_microdata(document);

    let mut schema_types = BTreeSet::new();
    for entry in json_ld.iter().chain(microdata.iter()) {
        collect_schema_types(entry, &mut schema_types);
    }

    StructuredData {
        json_ld,
        microdata,
        schema_org_types: schema_types.into_iter().collect(),
    }
}

fn extract_json_ld(document: &Html) -> Vec<Value> {
    let selector = match Selector::parse(r#"script[type="application/ld+json"]"#) {
        Ok(s) => s,
        Err(_) => return Vec::new(),
    };

    document
        .select(&selector)
        .filter_map(|el| {
            let text: String = el.text().collect();
            // Malformed entries are dropped, not surfaced as errors.
            serde_json::from_str::<Value>(text.trim()).ok()
        })
        .collect()
}

fn extract_microdata(document: &Html) -> Vec<Value> {
    let selector = match Selector::parse("[itemscope]") {
        Ok(s) => s,
        Err(_) => return Vec::new(),
    };

    document
        .select(&selector)
        .filter(|el| !has_itemscope_ancestor(*el))
        .map(microdata_item_to_value)
        .collect()
}

fn has_itemscope_ancestor(el: ElementRef) -> bool {
    el.ancestors()
        .filter_map(ElementRef::wrap)
        .any(|ancestor| ancestor.value().attr("itemscope").is_some())
}

fn microdata_item_to_value(el: ElementRef) -> Value {
    let mut map = serde_json::Map::new();
    if let Some(item_type) = el.value().attr("itemtype") {
        map.insert("@type".to_string(), Value::String(item_type.to_string()));
    }

    let prop_selector = Selector::parse("[itemprop]").expect("static selector");
    for prop_el in el.select(&prop_selector) {
        if has_closer_itemscope_ancestor(prop_el, el) {
            continue;
        }
        let Some(name) = prop_el.value().attr("itemprop") else {
            continue;
        };
        let value = if prop_el.value().attr("itemscope").is_some() {
            microdata_item_to_value(prop_el)
        } else {
            Value::String(property_value(prop_el))
        };
        insert_property(&mut map, name, value);
    }

    Value::Object(map)
}

fn has_closer_itemscope_ancestor(prop_el: ElementRef, item_root: ElementRef) -> bool {
    prop_el
        .ancestors()
        .filter_map(ElementRef::wrap)
        .take_while(|a| a.id() != item_root.id())
        .any(|a| a.value().attr("itemscope").is_some())
}

fn property_value(el: ElementRef) -> String {
    el.value()
        .attr("content")
        .map(str::to_string)
        .or_else(|| el.value().attr("href").map(str::to_string))
        .or_else(|| el.value().attr("src").map(str::to_string))
        .unwrap_or_else(|| el.text().collect::<Vec<_>>().join(" ").trim().to_string())
}

fn insert_property(map: &mut serde_json::Map<String, Value>, name: &str, value: Value) {
    match map.get_mut(name) {
        Some(Value::Array(existing)) => existing.push(value),
        Some(existing) => {
            let prior = existing.clone();
            map.insert(name.to_string(), Value::Array(vec![prior, value]));
        }
        None => {
            map.insert(name.to_string(), value);
        }
    }
}

fn collect_schema_types(value: &Value, out: &mut BTreeSet<String>) {
    match value {
        Value::Object(map) => {
            if let Some(t) = map.get("@type") {
                match t {
                    Value::String(s) => {
                        out.insert(s.clone());
                    }
                    Value::Array(items) => {
                        for item in items {
                            if let Value::String(s) = item {
                                out.insert(s.clone());
                            }
                        }
                    }
                    _ => {}
                }
            }
            for v in map.values() {
                collect_schema_types(v, out);
            }
        }
        Value::Array(items) => {
            for item in items {
                collect_schema_types(item, out);
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_valid_json_ld() {
        let html = r#"
            <html><head>
            <script type="application/ld+json">{"@type":"Article","headline":"Hi"}</script>
            </head></html>
        "#;
        let doc = Html::parse_document(html);
        let data = extract_structured_data(&doc);
        assert_eq!(data.json_ld.len(), 1);
        assert_eq!(data.schema_org_types, vec!["Article".to_string()]);
    }

    #[test]
    fn drops_malformed_json_ld_entries() {
        let html = r#"
            <html><head>
            <script type="application/ld+json">{not valid json}</script>
            <script type="application/ld+json">{"@type":"Thing"}</script>
            </head></html>
        "#;
        let doc = Html::parse_document(html);
        let data = extract_structured_data(&doc);
        assert_eq!(data.json_ld.len(), 1);
    }

    #[test]
    fn flattens_microdata_item() {
        let html = r#"
            <html><body>
                <div itemscope itemtype="https://schema.org/Person">
                    <span itemprop="name">Ada</span>
                </div>
            </body></html>
        "#;
        let doc = Html::parse_document(html);
        let data = extract_structured_data(&doc);
        assert_eq!(data.microdata.len(), 1);
        assert_eq!(data.microdata[0]["name"], "Ada");
        assert!(data.schema_org_types.contains(&"https://schema.org/Person".to_string()));
    }
}
