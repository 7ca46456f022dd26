//! Field-by-field record comparison.
//!
//! Each compared field has a named rule deciding how a missing value takes
//! part in the comparison. The rules reproduce the scoring pipeline's own
//! defaulting: weather and derived values skip when both sides are absent,
//! `waterTempForScoring` is always evaluated, `confidence` reads absent as
//! 0.0 and `overall` reads absent as a sentinel class.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::record::{Record, as_class, as_number, is_present};
use crate::tolerance::{ToleranceTable, approx_equal};

/// Weather inputs compared between dumps.
pub const WEATHER_FIELDS: [&str; 5] = [
    "temperature",
    "pressure",
    "humidity",
    "windSpeed",
    "precipitation",
];

/// Derived inputs compared between dumps.
pub const DERIVED_FIELDS: [&str; 6] = [
    "deltaPressure1h",
    "deltaPressure3hAvg",
    "deltaTemp1h",
    "rainPrev6h",
    "rainSum24h",
    "windStability3h",
];

/// Class an absent `overall` takes before comparison.
pub const OVERALL_SENTINEL: i64 = -9999;

/// Value an absent `confidence` takes before comparison.
pub const CONFIDENCE_DEFAULT: f64 = 0.0;

/// How a side with no value takes part in a numeric comparison.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AbsencePolicy {
    /// No diff when both raw values are absent; otherwise absent equals only absent.
    SkipIfBothAbsent,
    /// Always evaluated; absent equals only absent.
    Strict,
    /// An absent side takes this value.
    Substitute(f64),
}

/// Comparison rule for one field.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldRule {
    /// Tolerance comparison, tolerance looked up by field name.
    Numeric(AbsencePolicy),
    /// Exact integer comparison, evaluated when either side is present.
    Class { sentinel: i64 },
}

/// Where a compared field lives in a `Record`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldSource {
    Weather(&'static str),
    Derived(&'static str),
    WaterTemp,
    Overall,
    Confidence,
}

impl FieldSource {
    /// Name used for the tolerance lookup.
    pub fn name(&self) -> &'static str {
        match self {
            FieldSource::Weather(name) | FieldSource::Derived(name) => *name,
            FieldSource::WaterTemp => "waterTempForScoring",
            FieldSource::Overall => "overall",
            FieldSource::Confidence => "confidence",
        }
    }

    /// Dotted path used in diff reports.
    pub fn path(&self) -> String {
        match self {
            FieldSource::Weather(name) => format!("weather.{}", name),
            FieldSource::Derived(name) => format!("derived.{}", name),
            _ => self.name().to_string(),
        }
    }

    /// Raw value, with JSON null read as absent.
    pub fn value_in<'r>(&self, record: &'r Record) -> Option<&'r Value> {
        let value = match self {
            FieldSource::Weather(name) => record.weather.get(*name),
            FieldSource::Derived(name) => record.derived.get(*name),
            FieldSource::WaterTemp => record.water_temp_for_scoring.as_ref(),
            FieldSource::Overall => record.overall.as_ref(),
            FieldSource::Confidence => record.confidence.as_ref(),
        };
        value.filter(|v| !v.is_null())
    }
}

/// A compared field together with its rule.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FieldCheck {
    pub source: FieldSource,
    pub rule: FieldRule,
}

/// Every field compared, in report order.
pub fn field_checks() -> Vec<FieldCheck> {
    let skip = FieldRule::Numeric(AbsencePolicy::SkipIfBothAbsent);
    let mut checks: Vec<FieldCheck> = WEATHER_FIELDS
        .iter()
        .map(|&name| FieldCheck {
            source: FieldSource::Weather(name),
            rule: skip,
        })
        .chain(DERIVED_FIELDS.iter().map(|&name| FieldCheck {
            source: FieldSource::Derived(name),
            rule: skip,
        }))
        .collect();
    checks.push(FieldCheck {
        source: FieldSource::WaterTemp,
        rule: FieldRule::Numeric(AbsencePolicy::Strict),
    });
    checks.push(FieldCheck {
        source: FieldSource::Overall,
        rule: FieldRule::Class {
            sentinel: OVERALL_SENTINEL,
        },
    });
    checks.push(FieldCheck {
        source: FieldSource::Confidence,
        rule: FieldRule::Numeric(AbsencePolicy::Substitute(CONFIDENCE_DEFAULT)),
    });
    checks
}

/// A single field mismatch between a client and a server record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDiff {
    pub field: String,
    pub client: Value,
    pub server: Value,
    pub tolerance: f64,
}

impl core::fmt::Display for FieldDiff {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(
            f,
            "({}, {}, {}, {})",
            self.field, self.client, self.server, self.tolerance
        )
    }
}

/// `[(field, client, server, tolerance), ...]`
pub struct DiffList<'a>(pub &'a [FieldDiff]);

impl core::fmt::Display for DiffList<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "[")?;
        for (i, d) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", d)?;
        }
        write!(f, "]")
    }
}

/// Compare two records and return all field differences, in field order.
pub fn compare_records(
    client: &Record,
    server: &Record,
    tolerances: &ToleranceTable,
) -> Vec<FieldDiff> {
    let mut diffs = Vec::new();
    for check in field_checks() {
        check_field(&mut diffs, check, client, server, tolerances);
    }
    diffs
}

fn check_field(
    diffs: &mut Vec<FieldDiff>,
    check: FieldCheck,
    client: &Record,
    server: &Record,
    tolerances: &ToleranceTable,
) {
    let c_raw = check.source.value_in(client);
    let s_raw = check.source.value_in(server);

    let mismatch = match check.rule {
        FieldRule::Numeric(policy) => {
            let tolerance = tolerances.get(check.source.name());
            numeric_mismatch(policy, c_raw, s_raw, tolerance).then_some(tolerance)
        }
        FieldRule::Class { sentinel } => class_mismatch(sentinel, c_raw, s_raw).then_some(0.0),
    };

    if let Some(tolerance) = mismatch {
        diffs.push(FieldDiff {
            field: check.source.path(),
            client: c_raw.cloned().unwrap_or(Value::Null),
            server: s_raw.cloned().unwrap_or(Value::Null),
            tolerance,
        });
    }
}

fn numeric_mismatch(
    policy: AbsencePolicy,
    client: Option<&Value>,
    server: Option<&Value>,
    tolerance: f64,
) -> bool {
    let (c, s) = match policy {
        AbsencePolicy::SkipIfBothAbsent => {
            if client.is_none() && server.is_none() {
                return false;
            }
            (client.and_then(as_number), server.and_then(as_number))
        }
        AbsencePolicy::Strict => (client.and_then(as_number), server.and_then(as_number)),
        AbsencePolicy::Substitute(default) => (
            Some(substitute(client, default)),
            Some(substitute(server, default)),
        ),
    };
    !approx_equal(c, s, tolerance)
}

fn substitute(value: Option<&Value>, default: f64) -> f64 {
    value
        .filter(|v| is_present(v))
        .and_then(as_number)
        .unwrap_or(default)
}

fn class_mismatch(sentinel: i64, client: Option<&Value>, server: Option<&Value>) -> bool {
    let c_present = client.is_some_and(is_present);
    let s_present = server.is_some_and(is_present);
    if !c_present && !s_present {
        return false;
    }
    let class = |v: Option<&Value>| {
        v.filter(|v| is_present(v))
            .and_then(as_class)
            .unwrap_or(sentinel)
    };
    class(client) != class(server)
}
