use proptest::prelude::*;

use super::test::REFERENCE;
use super::{Config, LoadOptions};

fn padding() -> impl Strategy<Value = String> {
    return "[ \t]{0,3}";
}

fn class_names() -> impl Strategy<Value = Vec<String>> {
    return prop::collection::hash_set("[a-z][a-z0-9]{0,15}", 1..8)
        .prop_map(|classes| classes.into_iter().collect::<Vec<_>>())
        .prop_shuffle();
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 512,
        .. ProptestConfig::default()
    })]

    #[test]
    fn accessors_return_trimmed_values(
        master in "[a-zA-Z][a-zA-Z0-9 ]{0,10}[a-zA-Z0-9]",
        before in padding(),
        after in padding()
    ) {
        let text = REFERENCE.replace("master = admin", &format!("master ={}{}{}", before, master, after));
        let config = Config::parse(&text, &LoadOptions::default()).unwrap();

        prop_assert_eq!(config.common().master(), master.as_str());
    }

    #[test]
    fn classes_keep_source_order(
        classes in class_names(),
        separator in "[ \t]{0,2},[ \t]{0,2}"
    ) {
        let text = REFERENCE.replace("classes = top, posixGroup", &format!("classes = {}", classes.join(separator.as_str())));
        let config = Config::parse(&text, &LoadOptions::default()).unwrap();

        prop_assert_eq!(config.group().classes(), classes.as_slice());
    }

    #[test]
    fn id_ranges_are_validated(min in 1u32..100_000, max in 1u32..100_000) {
        let text = REFERENCE
            .replace("min_gid = 2000", &format!("min_gid = {}", min))
            .replace("max_gid = 65545", &format!("max_gid = {}", max));

        let config = Config::parse(&text, &LoadOptions::default());

        if min <= max {
            let config = config.unwrap();
            prop_assert_eq!(config.group().min_id(), min);
            prop_assert_eq!(config.group().max_id(), max);
        } else {
            let is_range_violation = matches!(config, Err(super::ConfigError::RangeViolation { .. }));
            prop_assert!(is_range_violation);
        }
    }
}
