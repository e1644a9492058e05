//! Resolved per-method measurement configuration.
//!
//! A [`MetricSpec`] is what the dispatcher actually reads at call time. It is
//! produced from markers (see [`crate::config::schema::MethodMarkers`]) or
//! built directly, and is read-only afterwards.

use std::borrow::Cow;
use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default timer name when a marker does not set one.
pub const DEFAULT_TIMER_NAME: &str = "method.invocation.timer";
/// Default counter name when a marker does not set one.
pub const DEFAULT_COUNTER_NAME: &str = "method.invocation.count";
/// Default in-flight gauge name when a marker does not set one.
pub const DEFAULT_GAUGE_NAME: &str = "method.invocation.active";
/// Default custom log template.
pub const DEFAULT_LOG_TEMPLATE: &str = "Total execution time is {}";

/// A single key/value tag.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Tag {
    pub key: String,
    pub value: String,
}

impl Tag {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// Error building [`Tags`] from a flat key/value list.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("tags must be key/value pairs, got {0} entries")]
pub struct TagsError(pub usize);

/// Ordered tag set.
///
/// Serialized as a flat `["key", "value", ...]` list, the same shape the
/// markers use.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "Vec<String>", into = "Vec<String>")]
pub struct Tags(Vec<Tag>);

impl Tags {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Build from a flat list of alternating keys and values.
    pub fn from_pairs<I, S>(flat: I) -> Result<Self, TagsError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let flat: Vec<String> = flat.into_iter().map(Into::into).collect();
        if flat.len() % 2 != 0 {
            return Err(TagsError(flat.len()));
        }
        let mut tags = Vec::with_capacity(flat.len() / 2);
        let mut iter = flat.into_iter();
        while let (Some(key), Some(value)) = (iter.next(), iter.next()) {
            tags.push(Tag { key, value });
        }
        Ok(Self(tags))
    }

    pub fn push(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.push(Tag::new(key, value));
    }

    pub fn extend(&mut self, other: &Tags) {
        self.0.extend(other.0.iter().cloned());
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Tag> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.iter().find(|t| t.key == key).map(|t| t.value.as_str())
    }

    pub fn as_slice(&self) -> &[Tag] {
        &self.0
    }
}

impl TryFrom<Vec<String>> for Tags {
    type Error = TagsError;

    fn try_from(flat: Vec<String>) -> Result<Self, Self::Error> {
        Self::from_pairs(flat)
    }
}

impl From<Tags> for Vec<String> {
    fn from(tags: Tags) -> Self {
        tags.0.into_iter().flat_map(|t| [t.key, t.value]).collect()
    }
}

impl FromIterator<Tag> for Tags {
    fn from_iter<I: IntoIterator<Item = Tag>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a Tags {
    type Item = &'a Tag;
    type IntoIter = std::slice::Iter<'a, Tag>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Unit used when formatting durations into log text.
///
/// Conversion truncates toward zero, so 1999µs in milliseconds is `1`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeUnit {
    Nanoseconds,
    Microseconds,
    #[default]
    Milliseconds,
    Seconds,
    Minutes,
    Hours,
    Days,
}

impl TimeUnit {
    fn nanos_per_unit(self) -> u128 {
        match self {
            TimeUnit::Nanoseconds => 1,
            TimeUnit::Microseconds => 1_000,
            TimeUnit::Milliseconds => 1_000_000,
            TimeUnit::Seconds => 1_000_000_000,
            TimeUnit::Minutes => 60 * 1_000_000_000,
            TimeUnit::Hours => 3_600 * 1_000_000_000,
            TimeUnit::Days => 86_400 * 1_000_000_000,
        }
    }

    /// Convert a duration into whole units of `self`.
    pub fn convert(self, duration: Duration) -> u128 {
        duration.as_nanos() / self.nanos_per_unit()
    }

    pub fn symbol(self) -> &'static str {
        match self {
            TimeUnit::Nanoseconds => "ns",
            TimeUnit::Microseconds => "µs",
            TimeUnit::Milliseconds => "ms",
            TimeUnit::Seconds => "s",
            TimeUnit::Minutes => "min",
            TimeUnit::Hours => "h",
            TimeUnit::Days => "d",
        }
    }
}

impl fmt::Display for TimeUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// Immutable configuration for one instrumented method.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricSpec {
    /// Timer name, and the base of the counter and gauge fallback names.
    pub name: String,
    pub counter_name: Option<String>,
    pub gauge_name: Option<String>,
    pub description: Option<String>,

    /// Complete tag set of each meter. Counters prepend the outcome tags.
    pub timer_tags: Tags,
    pub counter_tags: Tags,
    pub gauge_tags: Tags,

    pub enable_timer: bool,
    pub enable_counter: bool,
    pub enable_gauge: bool,

    /// Use a long-task timer instead of a point-in-time timer.
    pub long_task: bool,
    pub percentiles: Vec<f64>,
    pub publish_percentiles: bool,

    /// Skip success increments.
    pub count_failures_only: bool,

    pub enable_custom_logging: bool,
    pub log_template: String,
    pub timer_unit: TimeUnit,
}

impl Default for MetricSpec {
    fn default() -> Self {
        Self {
            name: DEFAULT_TIMER_NAME.to_string(),
            counter_name: None,
            gauge_name: None,
            description: None,
            timer_tags: Tags::new(),
            counter_tags: Tags::new(),
            gauge_tags: Tags::new(),
            enable_timer: false,
            enable_counter: false,
            enable_gauge: false,
            long_task: false,
            percentiles: Vec::new(),
            publish_percentiles: false,
            count_failures_only: false,
            enable_custom_logging: false,
            log_template: DEFAULT_LOG_TEMPLATE.to_string(),
            timer_unit: TimeUnit::Milliseconds,
        }
    }
}

impl MetricSpec {
    /// A spec with only the point-in-time timer enabled.
    pub fn timer(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            enable_timer: true,
            ..Self::default()
        }
    }

    /// A spec with only the counter enabled.
    pub fn counter(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            enable_counter: true,
            ..Self::default()
        }
    }

    /// Add a tag to every meter.
    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let (key, value): (String, String) = (key.into(), value.into());
        self.timer_tags.push(key.clone(), value.clone());
        self.counter_tags.push(key.clone(), value.clone());
        self.gauge_tags.push(key, value);
        self
    }

    /// Add a tag to the counter only.
    pub fn with_counter_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.counter_tags.push(key, value);
        self
    }

    pub fn with_counter(mut self, name: impl Into<String>) -> Self {
        self.enable_counter = true;
        self.counter_name = Some(name.into());
        self
    }

    pub fn with_gauge(mut self, name: impl Into<String>) -> Self {
        self.enable_gauge = true;
        self.gauge_name = Some(name.into());
        self
    }

    pub fn with_long_task(mut self) -> Self {
        self.long_task = true;
        self
    }

    pub fn with_percentiles(mut self, percentiles: impl Into<Vec<f64>>) -> Self {
        self.publish_percentiles = true;
        self.percentiles = percentiles.into();
        self
    }

    pub fn failures_only(mut self) -> Self {
        self.count_failures_only = true;
        self
    }

    pub fn with_custom_log(mut self, template: impl Into<String>, unit: TimeUnit) -> Self {
        self.enable_custom_logging = true;
        self.log_template = template.into();
        self.timer_unit = unit;
        self
    }

    /// Counter name.
    ///
    /// Without an explicit name the counter takes `name`, or `<name>.count`
    /// when the timer already owns `name`.
    pub fn counter_name(&self) -> Cow<'_, str> {
        match &self.counter_name {
            Some(name) => Cow::Borrowed(name.as_str()),
            None if self.enable_timer => Cow::Owned(format!("{}.count", self.name)),
            None => Cow::Borrowed(self.name.as_str()),
        }
    }

    /// In-flight gauge name.
    ///
    /// Without an explicit name the gauge takes `name`, or `<name>.active`
    /// when the timer or counter already owns `name`.
    pub fn gauge_name(&self) -> Cow<'_, str> {
        match &self.gauge_name {
            Some(name) => Cow::Borrowed(name.as_str()),
            None if self.enable_timer || self.enable_counter => Cow::Owned(format!("{}.active", self.name)),
            None => Cow::Borrowed(self.name.as_str()),
        }
    }

    /// True when at least one meter is enabled.
    pub fn is_active(&self) -> bool {
        self.enable_timer || self.enable_counter || self.enable_gauge
    }
}
