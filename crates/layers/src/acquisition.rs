//! Record acquisition for layers: preloaded, inline or remote payloads,
//! followed by the optional filter and sort of the data descriptor.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use expressions::{ExprError, Expression, to_number, truthy};
use formats::{Format, FormatError};
use foundation::math::nan_last_cmp_f64;
use parking_lot::Mutex;
use serde_json::Value;
use streaming::{DataSource, DataSourceError};
use tracing::debug;

use crate::context::{ExtraContext, expression_context};
use crate::spec::DataDescriptor;

#[derive(Debug)]
pub enum AcquireError {
    /// The descriptor's `type` names no known loader.
    UnsupportedFormat(String),
    Fetch(DataSourceError),
    Parse(FormatError),
    Expression(ExprError),
}

impl fmt::Display for AcquireError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AcquireError::UnsupportedFormat(t) => write!(f, "no loader for data type `{t}`"),
            AcquireError::Fetch(e) => write!(f, "fetch failed: {e}"),
            AcquireError::Parse(e) => write!(f, "{e}"),
            AcquireError::Expression(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for AcquireError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AcquireError::UnsupportedFormat(_) => None,
            AcquireError::Fetch(e) => Some(e),
            AcquireError::Parse(e) => Some(e),
            AcquireError::Expression(e) => Some(e),
        }
    }
}

impl From<DataSourceError> for AcquireError {
    fn from(e: DataSourceError) -> Self {
        AcquireError::Fetch(e)
    }
}

impl From<FormatError> for AcquireError {
    fn from(e: FormatError) -> Self {
        AcquireError::Parse(e)
    }
}

impl From<ExprError> for AcquireError {
    fn from(e: ExprError) -> Self {
        AcquireError::Expression(e)
    }
}

/// Resolves data descriptors to record payloads. Nothing is cached; every
/// call goes back to the source.
#[derive(Clone)]
pub struct Acquirer {
    source: Arc<dyn DataSource>,
}

impl Acquirer {
    pub fn new(source: Arc<dyn DataSource>) -> Self {
        Self { source }
    }

    pub async fn load(
        &self,
        descriptor: &DataDescriptor,
        extra: &ExtraContext,
    ) -> Result<Value, AcquireError> {
        let raw = if descriptor.loaded {
            descriptor.content.clone().unwrap_or(Value::Null)
        } else if let Some(inline) = descriptor.inline.as_ref().filter(|v| !is_blank(v)) {
            match inline {
                Value::String(src) => {
                    Expression::compile(src)?.evaluate(&Value::Object(extra.clone()))?
                }
                other => other.clone(),
            }
        } else {
            let type_name = descriptor.format.clone().unwrap_or_default();
            let format = Format::from_type_name(&type_name)
                .ok_or(AcquireError::UnsupportedFormat(type_name))?;
            let url = descriptor
                .url
                .as_deref()
                .ok_or_else(|| DataSourceError::new("data descriptor has no url"))?;
            debug!(url, format = format.name(), source = self.source.name(), "fetching layer data");
            let bytes = self.source.fetch(url).await?;
            format.decode(&bytes)?
        };
        filter_and_sort(descriptor, raw, extra)
    }
}

fn is_blank(v: &Value) -> bool {
    match v {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        _ => false,
    }
}

/// Apply `where` then `order` to an array payload. Other payloads (a
/// topology, a single feature) pass through untouched.
pub fn filter_and_sort(
    descriptor: &DataDescriptor,
    data: Value,
    extra: &ExtraContext,
) -> Result<Value, AcquireError> {
    let Value::Array(mut records) = data else {
        return Ok(data);
    };

    if let Some(src) = &descriptor.filter {
        let predicate = Expression::compile(src)?;
        let mut kept = Vec::with_capacity(records.len());
        for (i, record) in records.into_iter().enumerate() {
            if truthy(&predicate.evaluate(&expression_context(&record, Some(i), extra))?) {
                kept.push(record);
            }
        }
        records = kept;
    }

    if let Some(order) = &descriptor.order
        && let Some(field) = &order.field
    {
        let key = |r: &Value| r.get(field).map(to_number).unwrap_or(f64::NAN);
        records.sort_by(|a, b| nan_last_cmp_f64(key(a), key(b), order.ascending));
    }

    Ok(Value::Array(records))
}

/// A load attempt for one layer key. Stale tickets mean the layer was
/// deleted or recreated while the load was in flight.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadTicket {
    pub key: String,
    pub generation: u64,
}

/// Per-key load generations, shareable across tasks.
#[derive(Debug, Clone, Default)]
pub struct LoadRegistry {
    generations: Arc<Mutex<HashMap<String, u64>>>,
}

impl LoadRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a load, superseding any load in flight for `key`.
    pub fn begin(&self, key: &str) -> LoadTicket {
        LoadTicket {
            key: key.to_string(),
            generation: self.bump(key),
        }
    }

    /// Invalidate every load in flight for `key`.
    pub fn cancel(&self, key: &str) {
        self.bump(key);
    }

    pub fn is_current(&self, ticket: &LoadTicket) -> bool {
        self.generations.lock().get(&ticket.key) == Some(&ticket.generation)
    }

    fn bump(&self, key: &str) -> u64 {
        let mut generations = self.generations.lock();
        let g = generations.entry(key.to_string()).or_insert(0);
        *g += 1;
        *g
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::Order;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use streaming::MemorySource;

    fn remote(url: &str, format: &str) -> DataDescriptor {
        DataDescriptor {
            url: Some(url.to_string()),
            format: Some(format.to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn sorts_by_numeric_field() {
        let descriptor = DataDescriptor {
            order: Some(Order {
                field: Some("v".to_string()),
                ascending: true,
            }),
            ..Default::default()
        };
        let data = json!([{"v": 3}, {"v": 1}, {"v": 2}]);
        let sorted = filter_and_sort(&descriptor, data.clone(), &ExtraContext::new()).unwrap();
        assert_eq!(sorted, json!([{"v": 1}, {"v": 2}, {"v": 3}]));

        let descending = DataDescriptor {
            order: Some(Order {
                field: Some("v".to_string()),
                ascending: false,
            }),
            ..Default::default()
        };
        let sorted = filter_and_sort(&descending, data, &ExtraContext::new()).unwrap();
        assert_eq!(sorted, json!([{"v": 3}, {"v": 2}, {"v": 1}]));
    }

    #[test]
    fn filters_with_index_and_extra_context() {
        let descriptor = DataDescriptor {
            filter: Some("d.country == shape.id && i > 0".to_string()),
            order: Some(Order {
                field: Some("mag".to_string()),
                ascending: true,
            }),
            ..Default::default()
        };
        let mut extra = ExtraContext::new();
        extra.insert("shape".to_string(), json!({"id": "JPN"}));
        let data = json!([
            {"country": "JPN", "mag": "7.1"},
            {"country": "JPN", "mag": "6.2"},
            {"country": "CHL", "mag": "8.0"},
            {"country": "JPN", "mag": "5.9"},
            {"country": "JPN", "mag": "n/a"}
        ]);
        let out = filter_and_sort(&descriptor, data, &extra).unwrap();
        assert_eq!(
            out,
            json!([
                {"country": "JPN", "mag": "5.9"},
                {"country": "JPN", "mag": "6.2"},
                {"country": "JPN", "mag": "n/a"}
            ])
        );
    }

    #[test]
    fn unparseable_fields_sort_after_numbers() {
        let data: Vec<Value> = (0..2000)
            .map(|i| {
                if i % 3 == 0 {
                    json!({"i": i, "v": "n/a"})
                } else {
                    json!({"i": i, "v": ((i * 7919) % 1000).to_string()})
                }
            })
            .collect();
        let unparseable = data.iter().filter(|r| r["v"] == "n/a").count();

        for ascending in [true, false] {
            let descriptor = DataDescriptor {
                order: Some(Order {
                    field: Some("v".to_string()),
                    ascending,
                }),
                ..Default::default()
            };
            let out = filter_and_sort(&descriptor, Value::Array(data.clone()), &ExtraContext::new())
                .unwrap();
            let out = out.as_array().unwrap();
            assert_eq!(out.len(), data.len());

            let (numeric, rest) = out.split_at(out.len() - unparseable);
            assert!(rest.iter().all(|r| r["v"] == "n/a"));
            let values: Vec<f64> = numeric.iter().map(|r| to_number(&r["v"])).collect();
            assert!(values.iter().all(|v| !v.is_nan()));
            let sorted = values.windows(2).all(|w| if ascending { w[0] <= w[1] } else { w[0] >= w[1] });
            assert!(sorted, "ascending={ascending}");

            // Unparseable records keep their input order.
            let order: Vec<i64> = rest.iter().map(|r| r["i"].as_i64().unwrap()).collect();
            assert!(order.windows(2).all(|w| w[0] < w[1]));
        }
    }

    #[test]
    fn objects_pass_through() {
        let descriptor = DataDescriptor {
            filter: Some("false".to_string()),
            ..Default::default()
        };
        let topo = json!({"type": "Topology", "objects": {}});
        assert_eq!(
            filter_and_sort(&descriptor, topo.clone(), &ExtraContext::new()).unwrap(),
            topo
        );
    }

    #[tokio::test]
    async fn loads_remote_csv_and_json() {
        let source = Arc::new(
            MemorySource::new()
                .with("data/cities.csv", "name,pop\nLyon,513275\nNice,342669\n")
                .with("data/cities.json", r#"[{"name": "Lyon"}]"#),
        );
        let acquirer = Acquirer::new(source.clone());
        let extra = ExtraContext::new();

        let csv = acquirer
            .load(&remote("data/cities.csv", "csv"), &extra)
            .await
            .unwrap();
        assert_eq!(
            csv,
            json!([{"name": "Lyon", "pop": "513275"}, {"name": "Nice", "pop": "342669"}])
        );
        let json = acquirer
            .load(&remote("data/cities.json", "json"), &extra)
            .await
            .unwrap();
        assert_eq!(json, json!([{"name": "Lyon"}]));

        // No caching between calls.
        acquirer
            .load(&remote("data/cities.json", "json"), &extra)
            .await
            .unwrap();
        assert_eq!(source.fetch_count(), 3);
    }

    #[tokio::test]
    async fn preloaded_and_inline_skip_the_source() {
        let source = Arc::new(MemorySource::new());
        let acquirer = Acquirer::new(source.clone());
        let extra = ExtraContext::new();

        let preloaded = DataDescriptor {
            loaded: true,
            content: Some(json!([{"v": 2}, {"v": 1}])),
            filter: Some("d.v > 1".to_string()),
            ..Default::default()
        };
        assert_eq!(
            acquirer.load(&preloaded, &extra).await.unwrap(),
            json!([{"v": 2}])
        );

        let inline = DataDescriptor {
            inline: Some(json!("[{name: 'a'}, {name: 'b'}]")),
            ..Default::default()
        };
        assert_eq!(
            acquirer.load(&inline, &extra).await.unwrap(),
            json!([{"name": "a"}, {"name": "b"}])
        );
        assert_eq!(source.fetch_count(), 0);
    }

    #[tokio::test]
    async fn unknown_type_and_missing_payload_fail() {
        let acquirer = Acquirer::new(Arc::new(MemorySource::new()));
        let extra = ExtraContext::new();

        let err = acquirer
            .load(&remote("a.xml", "xml"), &extra)
            .await
            .unwrap_err();
        assert!(matches!(err, AcquireError::UnsupportedFormat(t) if t == "xml"));

        let err = acquirer
            .load(&remote("missing.json", "json"), &extra)
            .await
            .unwrap_err();
        assert!(matches!(err, AcquireError::Fetch(_)));
    }

    #[test]
    fn newer_loads_supersede_older_ones() {
        let registry = LoadRegistry::new();
        let first = registry.begin("map1-quakes");
        assert!(registry.is_current(&first));

        let second = registry.begin("map1-quakes");
        assert!(!registry.is_current(&first));
        assert!(registry.is_current(&second));

        registry.clone().cancel("map1-quakes");
        assert!(!registry.is_current(&second));
        assert!(registry.is_current(&registry.begin("map1-other")));
    }
}
