use ftlplay::{render, render_value};
use proptest::prelude::*;
use serde_json::json;

proptest! {
    #[test]
    fn plain_text_passes_through(text in "[a-zA-Z0-9 .,:;!?()\n-]{0,80}") {
        let rendered = render_value(&text, &json!({})).unwrap();
        prop_assert_eq!(rendered, text.trim());
    }

    #[test]
    fn integer_arithmetic_matches_rust(a in -10_000i64..10_000, b in -10_000i64..10_000) {
        let data = json!({"a": a, "b": b});
        prop_assert_eq!(render_value("${a + b}", &data).unwrap(), (a + b).to_string());
        prop_assert_eq!(render_value("${a * b}", &data).unwrap(), (a * b).to_string());
        prop_assert_eq!(render_value("${a - b}", &data).unwrap(), (a - b).to_string());
    }

    #[test]
    fn non_numeric_operands_never_compute(word in "[a-zA-Z_]{1,12}") {
        let data = json!({"s": word});
        prop_assert_eq!(
            render_value("${s * 2}", &data).unwrap(),
            "[Error in expression: s * 2]"
        );
    }

    #[test]
    fn list_output_has_one_line_per_item(items in proptest::collection::vec("[a-z]{1,6}", 1..12)) {
        let data = json!({"items": items});
        let rendered = render_value("<#list items as i>${i}</#list>", &data).unwrap();
        prop_assert_eq!(rendered, items.join("\n"));
    }

    #[test]
    fn arbitrary_input_never_panics(template in ".{0,200}", data in ".{0,40}") {
        let _ = render(&template, Some(&data));
        let _ = render(&template, None);
    }
}
