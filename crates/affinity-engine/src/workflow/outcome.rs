//! Phase result envelopes
//!
//! Agents and intermediate layers hand results back in a handful of
//! historical shapes: the payload itself, `{"data": ...}`, `{"result": ...}`,
//! or `{"result": {"data": ...}}`. The variants are modeled explicitly and
//! unwrapped in exactly one place so no caller ever probes shapes ad hoc.

use serde_json::Value;

/// Every envelope shape a phase result can arrive in
#[derive(Debug, Clone, PartialEq)]
pub enum PhaseOutcome {
    /// Bare payload
    Raw(Value),
    /// `{"data": payload}`
    Wrapped(Value),
    /// `{"result": payload}` where payload is not itself data-wrapped
    DictWrapped(Value),
    /// `{"result": {"data": payload}}`
    NestedDictWrapped(Value),
}

impl PhaseOutcome {
    /// Classify a value into the envelope shape it uses. Objects that carry
    /// a `data` or `result` key are treated as envelopes; anything else is
    /// the payload itself.
    pub fn classify(value: Value) -> PhaseOutcome {
        match &value {
            Value::Object(map) => {
                if let Some(result) = map.get("result") {
                    if result
                        .as_object()
                        .map(|inner| inner.contains_key("data"))
                        .unwrap_or(false)
                    {
                        return PhaseOutcome::NestedDictWrapped(value);
                    }
                    return PhaseOutcome::DictWrapped(value);
                }
                if map.contains_key("data") {
                    return PhaseOutcome::Wrapped(value);
                }
                PhaseOutcome::Raw(value)
            }
            _ => PhaseOutcome::Raw(value),
        }
    }

    /// The payload, whatever wrapping it arrived in
    pub fn into_payload(self) -> Value {
        match self {
            PhaseOutcome::Raw(value) => value,
            PhaseOutcome::Wrapped(mut value) => value
                .as_object_mut()
                .and_then(|m| m.remove("data"))
                .unwrap_or(Value::Null),
            PhaseOutcome::DictWrapped(mut value) => value
                .as_object_mut()
                .and_then(|m| m.remove("result"))
                .unwrap_or(Value::Null),
            PhaseOutcome::NestedDictWrapped(mut value) => value
                .as_object_mut()
                .and_then(|m| m.remove("result"))
                .and_then(|mut r| r.as_object_mut().and_then(|m| m.remove("data")))
                .unwrap_or(Value::Null),
        }
    }
}

/// Classify-then-unwrap in one call; the only payload accessor callers use
pub fn unwrap_phase_result(value: Value) -> Value {
    PhaseOutcome::classify(value).into_payload()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_every_envelope_shape_yields_same_payload() {
        let payload = json!({"destination": "Tokyo", "quality_score": 0.8});
        let shapes = vec![
            payload.clone(),
            json!({"data": payload.clone()}),
            json!({"result": payload.clone()}),
            json!({"result": {"data": payload.clone()}}),
        ];
        for shape in shapes {
            assert_eq!(unwrap_phase_result(shape), payload);
        }
    }

    #[test]
    fn test_classification_is_distinct_per_shape() {
        let payload = json!({"x": 1});
        assert!(matches!(
            PhaseOutcome::classify(payload.clone()),
            PhaseOutcome::Raw(_)
        ));
        assert!(matches!(
            PhaseOutcome::classify(json!({"data": payload.clone()})),
            PhaseOutcome::Wrapped(_)
        ));
        assert!(matches!(
            PhaseOutcome::classify(json!({"result": payload.clone()})),
            PhaseOutcome::DictWrapped(_)
        ));
        assert!(matches!(
            PhaseOutcome::classify(json!({"result": {"data": payload}})),
            PhaseOutcome::NestedDictWrapped(_)
        ));
    }

    #[test]
    fn test_non_object_values_pass_through() {
        assert_eq!(unwrap_phase_result(json!([1, 2, 3])), json!([1, 2, 3]));
        assert_eq!(unwrap_phase_result(json!("plain")), json!("plain"));
    }
}
