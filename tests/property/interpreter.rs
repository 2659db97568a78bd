use proptest::prelude::*;
use serde_json::{json, Value};

use benchrun::engine::interpret::excerpt;
use benchrun::engine::{interpret, FailureKind, Interpretation};

fn json_leaf() -> impl Strategy<Value = Value> {
    prop_oneof![
        any::<bool>().prop_map(Value::from),
        any::<i64>().prop_map(Value::from),
        "[a-z]{0,12}".prop_map(Value::from),
    ]
}

fn results_payload() -> impl Strategy<Value = Value> {
    proptest::collection::btree_map("[a-z_]{1,10}", json_leaf(), 0..6)
        .prop_map(|m| Value::Object(m.into_iter().collect()))
}

proptest! {
    #[test]
    fn success_document_yields_its_payload(payload in results_payload(), pad in "[ \n\t]{0,4}") {
        let doc = format!("{pad}{}{pad}", json!({ "success": true, "results": payload.clone() }));
        prop_assert_eq!(interpret(&doc, 500), Interpretation::Success { payload });
    }

    #[test]
    fn success_false_is_never_a_success(payload in results_payload(), error in proptest::option::of("[ -~]{0,40}")) {
        let mut doc = json!({ "success": false, "results": payload });
        if let Some(error) = &error {
            doc["error"] = Value::from(error.clone());
        }

        match interpret(&doc.to_string(), 500) {
            Interpretation::Failure { kind, reason } => {
                prop_assert_eq!(kind, FailureKind::InBandEvaluationFailure);
                match error {
                    Some(e) if !e.trim().is_empty() => prop_assert_eq!(reason, e),
                    _ => prop_assert_eq!(reason, "Unknown error"),
                }
            }
            other => prop_assert!(false, "unexpected success: {:?}", other),
        }
    }

    #[test]
    fn malformed_output_quotes_a_bounded_excerpt(text in "x[a-zA-Z ]{0,1999}", limit in 1usize..600) {
        match interpret(&text, limit) {
            Interpretation::Failure { kind, reason } => {
                prop_assert_eq!(kind, FailureKind::MalformedOutput);
                let (_, quoted) = reason.split_once("\nOutput: ").expect("output section");
                prop_assert!(quoted.chars().count() <= limit);
                prop_assert!(text.starts_with(quoted));
            }
            other => prop_assert!(false, "unexpected verdict: {:?}", other),
        }
    }

    #[test]
    fn excerpt_never_splits_characters(text in "\\PC{0,300}", limit in 0usize..400) {
        let cut = excerpt(&text, limit);
        prop_assert_eq!(cut.chars().count(), text.chars().count().min(limit));
        prop_assert!(text.starts_with(&cut));
    }
}
