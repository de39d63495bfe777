use super::collections::json_label;
use super::{DehydrateContext, Dehydrated, HydrateContext, Meta, Synthesizer};
use crate::error::{LiveError, LiveResult};
use crate::value::Value;
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, SecondsFormat, Utc};

const KIND: &str = "t";
const NAIVE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";
const DATE_FORMAT: &str = "%Y-%m-%d";

/// Dehydrates chrono dates and times as strings.
///
/// The meta records which chrono type produced the string (`utc`, `fixed`,
/// `naive` or `date`) so hydration restores the same type, offset included.
#[derive(Debug, Clone, Copy, Default)]
pub struct DateSynth;

impl Synthesizer for DateSynth {
	fn key(&self) -> &str {
		"date"
	}

	fn matches(&self, value: &Value) -> bool {
		value.downcast_ref::<DateTime<Utc>>().is_some()
			|| value.downcast_ref::<DateTime<FixedOffset>>().is_some()
			|| value.downcast_ref::<NaiveDateTime>().is_some()
			|| value.downcast_ref::<NaiveDate>().is_some()
	}

	fn dehydrate(&self, value: &Value, _ctx: &DehydrateContext<'_>) -> LiveResult<Dehydrated> {
		let (kind, text) = if let Some(date) = value.downcast_ref::<DateTime<Utc>>() {
			("utc", date.to_rfc3339_opts(SecondsFormat::AutoSi, true))
		} else if let Some(date) = value.downcast_ref::<DateTime<FixedOffset>>() {
			("fixed", date.to_rfc3339_opts(SecondsFormat::AutoSi, false))
		} else if let Some(date) = value.downcast_ref::<NaiveDateTime>() {
			("naive", date.format(NAIVE_FORMAT).to_string())
		} else if let Some(date) = value.downcast_ref::<NaiveDate>() {
			("date", date.format(DATE_FORMAT).to_string())
		} else {
			return Err(LiveError::mismatch("date", value.type_label()));
		};
		let meta = Meta::new(self.key()).with_extra(KIND, serde_json::Value::from(kind));
		Ok((serde_json::Value::String(text), Some(meta)))
	}

	fn hydrate(
		&self,
		wire: serde_json::Value,
		meta: &Meta,
		_ctx: &HydrateContext<'_>,
	) -> LiveResult<Value> {
		let text = match &wire {
			serde_json::Value::String(text) => text.as_str(),
			other => return Err(LiveError::mismatch("date string", json_label(other))),
		};
		let invalid = |_| LiveError::mismatch("date string", format!("{:?}", text));
		match meta.extra_str(KIND).unwrap_or("utc") {
			"utc" => DateTime::parse_from_rfc3339(text)
				.map(|date| Value::object(date.with_timezone(&Utc)))
				.map_err(invalid),
			"fixed" => DateTime::parse_from_rfc3339(text)
				.map(Value::object)
				.map_err(invalid),
			"naive" => NaiveDateTime::parse_from_str(text, NAIVE_FORMAT)
				.map(Value::object)
				.map_err(invalid),
			"date" => NaiveDate::parse_from_str(text, DATE_FORMAT)
				.map(Value::object)
				.map_err(invalid),
			other => Err(LiveError::UnsupportedType(format!("date/{}", other))),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::synth::SynthesizerRegistry;
	use crate::synth::test_support::round_trip;
	use chrono::TimeZone;
	use rstest::rstest;

	#[rstest]
	#[case(Value::object(Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 5).unwrap()))]
	#[case(Value::object(
		FixedOffset::east_opt(9 * 3600).unwrap().with_ymd_and_hms(2024, 3, 1, 12, 30, 5).unwrap()
	))]
	#[case(Value::object(
		NaiveDate::from_ymd_opt(2024, 3, 1).unwrap().and_hms_milli_opt(1, 2, 3, 456).unwrap()
	))]
	#[case(Value::object(NaiveDate::from_ymd_opt(1999, 12, 31).unwrap()))]
	fn test_date_round_trip(#[case] value: Value) {
		// Arrange
		let registry = SynthesizerRegistry::new();

		// Act & Assert
		assert_eq!(round_trip(&registry, &value), value);
	}

	#[rstest]
	fn test_fixed_offset_is_preserved() {
		// Arrange
		let registry = SynthesizerRegistry::new();
		let ctx = DehydrateContext {
			registry: &registry,
			component: "c",
			property: "p",
		};
		let date = FixedOffset::west_opt(5 * 3600)
			.unwrap()
			.with_ymd_and_hms(2024, 1, 2, 3, 4, 5)
			.unwrap();

		// Act
		let (wire, meta) = DateSynth.dehydrate(&Value::object(date), &ctx).unwrap();

		// Assert
		assert_eq!(wire, serde_json::json!("2024-01-02T03:04:05-05:00"));
		assert_eq!(meta.unwrap().extra_str("t"), Some("fixed"));
	}

	#[rstest]
	fn test_garbage_date_is_type_mismatch() {
		// Arrange
		let registry = SynthesizerRegistry::new();
		let ctx = HydrateContext {
			registry: &registry,
			models: &crate::model::NoModels,
		};
		let meta = Meta::new("date").with_extra("t", serde_json::json!("date"));

		// Act
		let result = DateSynth.hydrate(serde_json::json!("not a date"), &meta, &ctx);

		// Assert
		assert!(matches!(result, Err(LiveError::TypeMismatch { .. })));
	}
}
