//! JSON wire helpers for [`ScalarModel`].
//!
//! The document shape is `{"type": "<family>", ...family fields...}`, with
//! composites carrying parallel `"weights"` and `"sub_models"` arrays. This
//! is the exact contract the surrounding persistence layer reads and
//! writes; the serde derives on [`ScalarModel`] define it, and this module
//! pins it with convenience functions and round-trip coverage.

use crate::error::{ExtractError, ExtractResult};
use crate::model::ScalarModel;

/// Serializes a model to its JSON wire form.
pub fn to_json(model: &ScalarModel) -> String {
    serde_json::to_string(model).expect("scalar models always serialize")
}

/// Parses a model from its JSON wire form.
pub fn from_json(json: &str) -> ExtractResult<ScalarModel> {
    serde_json::from_str(json).map_err(|_| ExtractError::InvalidModel {
        context: "malformed model JSON",
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn round_trip(model: &ScalarModel) -> ScalarModel {
        let json = to_json(model);
        from_json(&json).expect("round-trip parse")
    }

    #[test]
    fn normal_wire_fields() {
        let m = ScalarModel::normal(1.5, 0.5).unwrap();
        let json = to_json(&m);
        assert!(json.contains("\"type\":\"normal\""), "{json}");
        assert!(json.contains("\"mean\":1.5"), "{json}");
        assert!(json.contains("\"std_dev\":0.5"), "{json}");
        // Unbounded normals omit the truncation fields entirely.
        assert!(!json.contains("lower_bound"), "{json}");
        assert_eq!(round_trip(&m), m);
    }

    #[test]
    fn truncated_normal_keeps_bounds() {
        let m = ScalarModel::truncated_normal(0.0, 1.0, -1.0, 1.0).unwrap();
        let json = to_json(&m);
        assert!(json.contains("\"lower_bound\":-1.0"), "{json}");
        assert!(json.contains("\"upper_bound\":1.0"), "{json}");
        assert_eq!(round_trip(&m), m);
    }

    #[test]
    fn every_family_round_trips() {
        let models = [
            ScalarModel::uniform(-2.0, 3.0).unwrap(),
            ScalarModel::beta(2.5, 1.5, 0.0, 1.0).unwrap(),
            ScalarModel::gamma(2.0, 1.5, 0.5).unwrap(),
            ScalarModel::student_t(12.0, -1.0, 2.0).unwrap(),
            ScalarModel::inverse_gamma(4.0, 3.0).unwrap(),
            ScalarModel::beta_prime(2.0, 5.0).unwrap(),
            ScalarModel::pearson_iv(2.5, 0.8, 1.2, 0.3).unwrap(),
            ScalarModel::empirical(vec![0.0, 0.5, 1.0], vec![0.0, 0.4, 1.0]).unwrap(),
        ];
        for m in &models {
            assert_eq!(&round_trip(m), m, "{}", m.model_type());
        }
    }

    #[test]
    fn composite_wire_shape() {
        let mix = ScalarModel::composite(
            vec![0.3, 0.7],
            vec![
                ScalarModel::normal(-2.0, 0.5).unwrap(),
                ScalarModel::normal(2.0, 0.5).unwrap(),
            ],
        )
        .unwrap();
        let json = to_json(&mix);
        assert!(json.contains("\"type\":\"composite\""), "{json}");
        assert!(json.contains("\"weights\":[0.3,0.7]"), "{json}");
        assert!(json.contains("\"sub_models\":["), "{json}");
        assert_eq!(round_trip(&mix), mix);
    }

    #[test]
    fn type_tags_match_model_type() {
        let m = ScalarModel::student_t(5.0, 0.0, 1.0).unwrap();
        let json = to_json(&m);
        assert!(json.contains("\"type\":\"student_t\""), "{json}");
        let m = ScalarModel::inverse_gamma(3.0, 1.0).unwrap();
        assert!(to_json(&m).contains("\"type\":\"inverse_gamma\""));
        let m = ScalarModel::beta_prime(3.0, 5.0).unwrap();
        assert!(to_json(&m).contains("\"type\":\"beta_prime\""));
        let m = ScalarModel::pearson_iv(2.0, 0.0, 1.0, 0.0).unwrap();
        assert!(to_json(&m).contains("\"type\":\"pearson_iv\""));
    }

    #[test]
    fn unknown_type_is_rejected() {
        let err = from_json("{\"type\":\"cauchy\",\"x0\":0.0}");
        assert!(matches!(err, Err(ExtractError::InvalidModel { .. })));
    }

    #[test]
    fn missing_type_is_rejected() {
        let err = from_json("{\"mean\":0.0,\"std_dev\":1.0}");
        assert!(matches!(err, Err(ExtractError::InvalidModel { .. })));
    }
}
