//! Time-series reveal for circle layers: each record flashes once, delayed
//! by how far its value sits above the smallest one, while a ticker counts
//! through the values in a label.

use expressions::{ExprError, Expression, to_display_string, to_number};
use foundation::math::format_number;
use scene::NodeId;
use serde_json::Value;

use crate::context::{ExtraContext, expression_context};
use crate::spec::AnimationConfig;

pub const DEFAULT_INTERVAL_MS: f64 = 500.0;

#[derive(Debug, Clone, PartialEq)]
pub struct AnimatedRecord {
    /// Position in the input sequence.
    pub index: usize,
    pub record: Value,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AnimationPlan {
    pub records: Vec<AnimatedRecord>,
    pub min: f64,
    pub max: f64,
    pub interval: f64,
}

impl AnimationPlan {
    /// Keep records whose animation value is a number (and above
    /// `startValue` when set). `None` when no record qualifies.
    pub fn build(
        records: &[Value],
        config: &AnimationConfig,
        extra: &ExtraContext,
    ) -> Result<Option<Self>, ExprError> {
        let value = Expression::compile(config.value.as_deref().unwrap_or(""))?;
        let mut kept = Vec::new();
        for (i, record) in records.iter().enumerate() {
            let v = to_number(&value.evaluate(&expression_context(record, Some(i), extra))?);
            if v.is_nan() {
                continue;
            }
            if config.start_value.is_some_and(|start| v <= start) {
                continue;
            }
            kept.push(AnimatedRecord {
                index: i,
                record: record.clone(),
                value: v,
            });
        }
        if kept.is_empty() {
            return Ok(None);
        }
        let min = kept.iter().map(|r| r.value).fold(f64::INFINITY, f64::min);
        let max = kept.iter().map(|r| r.value).fold(f64::NEG_INFINITY, f64::max);
        Ok(Some(Self {
            records: kept,
            min,
            max,
            interval: config.interval.unwrap_or(DEFAULT_INTERVAL_MS),
        }))
    }

    pub fn delay(&self, value: f64) -> f64 {
        (value - self.min) * self.interval
    }

    pub fn delays(&self) -> Vec<f64> {
        self.records.iter().map(|r| self.delay(r.value)).collect()
    }
}

/// Fade-out bookkeeping for one animated layer.
#[derive(Debug, Clone, PartialEq)]
pub struct AnimationRun {
    pub remaining: usize,
    pub show_all_at_end: bool,
    pub elements: Vec<NodeId>,
}

impl AnimationRun {
    /// Count one finished record. True once the last one finished and every
    /// element should be shown again.
    pub fn record_faded(&mut self) -> bool {
        self.remaining = self.remaining.saturating_sub(1);
        self.remaining == 0 && self.show_all_at_end
    }
}

/// Repeating counter shown in `<mapId>-animation`.
#[derive(Debug, Clone, PartialEq)]
pub struct Ticker {
    pub owner: String,
    pub target: String,
    pub current: f64,
    pub max: f64,
    pub label: Option<Expression>,
    pub extra: ExtraContext,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Tick {
    pub text: String,
    pub finished: bool,
}

impl Ticker {
    /// Text for the current value, then step. Once past `max` the text is
    /// blanked and the ticker is finished.
    pub fn fire(&mut self) -> Result<Tick, ExprError> {
        let text = match &self.label {
            Some(label) => {
                let ctx = expression_context(&Value::from(self.current), Some(0), &self.extra);
                match label.evaluate(&ctx)? {
                    Value::Null => String::new(),
                    other => to_display_string(&other),
                }
            }
            None => format_number(self.current),
        };
        self.current += 1.0;
        if self.current > self.max {
            return Ok(Tick {
                text: String::new(),
                finished: true,
            });
        }
        Ok(Tick {
            text,
            finished: false,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn config(value: &str) -> AnimationConfig {
        AnimationConfig {
            value: Some(value.to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn delays_grow_with_distance_from_the_minimum() {
        let records = vec![json!({"y": 10}), json!({"y": 12}), json!({"y": 15})];
        let plan = AnimationPlan::build(&records, &config("d.y"), &ExtraContext::new())
            .unwrap()
            .unwrap();
        assert_eq!(plan.delays(), vec![0.0, 1000.0, 2500.0]);
        assert_eq!((plan.min, plan.max), (10.0, 15.0));
    }

    #[test]
    fn skips_non_numbers_and_values_up_to_start() {
        let records = vec![
            json!({"y": "2001"}),
            json!({"y": "unknown"}),
            json!({}),
            json!({"y": 1999}),
            json!({"y": 2000}),
        ];
        let mut cfg = config("d.y");
        cfg.start_value = Some(2000.0);
        cfg.interval = Some(100.0);
        let plan = AnimationPlan::build(&records, &cfg, &ExtraContext::new())
            .unwrap()
            .unwrap();
        assert_eq!(plan.records.len(), 1);
        assert_eq!(plan.records[0].index, 0);
        assert_eq!(plan.records[0].value, 2001.0);
        assert_eq!(plan.interval, 100.0);

        cfg.start_value = Some(3000.0);
        assert_eq!(
            AnimationPlan::build(&records, &cfg, &ExtraContext::new()).unwrap(),
            None
        );
    }

    #[test]
    fn ticker_stops_once_past_max() {
        let mut ticker = Ticker {
            owner: "map1-quakes".to_string(),
            target: "map1-animation".to_string(),
            current: 10.0,
            max: 15.0,
            label: None,
            extra: ExtraContext::new(),
        };
        let mut texts = Vec::new();
        loop {
            let tick = ticker.fire().unwrap();
            texts.push(tick.text);
            if tick.finished {
                break;
            }
        }
        assert_eq!(texts, vec!["10", "11", "12", "13", "14", ""]);
    }

    #[test]
    fn ticker_renders_its_label() {
        let mut ticker = Ticker {
            owner: "map2-quakes".to_string(),
            target: "map2-animation".to_string(),
            current: 1990.0,
            max: 1991.0,
            label: Some(Expression::compile("'Year ' + d").unwrap()),
            extra: ExtraContext::new(),
        };
        assert_eq!(ticker.fire().unwrap().text, "Year 1990");
    }

    #[test]
    fn run_reveals_everything_after_the_last_fade() {
        let mut run = AnimationRun {
            remaining: 2,
            show_all_at_end: true,
            elements: Vec::new(),
        };
        assert!(!run.record_faded());
        assert!(run.record_faded());
    }
}
