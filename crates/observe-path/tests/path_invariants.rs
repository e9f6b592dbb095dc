use deep_observe_path::{Key, Path};
use proptest::prelude::*;

fn key_strategy() -> impl Strategy<Value = String> {
    "[a-z_][a-z0-9_]{0,6}"
}

proptest! {
    #[test]
    fn concat_then_after_yields_the_key(prefix in prop::collection::vec(key_strategy(), 0..5), key in key_strategy()) {
        let key = Key::from(key);

        let text = Path::text(prefix.join("."));
        let joined = text.concat(&key);
        prop_assert_eq!(joined.after(&text).keys(), vec![key.clone()]);
        prop_assert_eq!(joined.initial(), text);
        prop_assert_eq!(joined.last(), key.clone());

        let segments = Path::from_keys(prefix.iter().map(String::as_str));
        let joined = segments.concat(&key);
        prop_assert_eq!(joined.after(&segments), Path::Segments(vec![key.clone()]));
        prop_assert_eq!(joined.initial(), segments);
        prop_assert_eq!(joined.last(), key);
    }

    #[test]
    fn text_and_segment_modes_agree(keys in prop::collection::vec(key_strategy(), 0..6)) {
        let segments = Path::from_keys(keys.iter().map(String::as_str));
        let text = segments.to_text();
        prop_assert_eq!(text.len(), keys.len());
        prop_assert_eq!(text.to_segments(), segments);
    }
}
