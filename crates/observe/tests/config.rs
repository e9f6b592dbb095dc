mod common;

use common::{json, observe};
use deep_observe::{DetailsConfig, ObserveConfig, Options, Value};

#[test]
fn config_loads_from_toml() {
    let config: ObserveConfig = toml::from_str(
        r#"
        pathAsArray = true
        ignore_underscores = true
        ignoreKeys = ["skip"]
        details = ["push"]
        "#,
    )
    .unwrap();

    assert!(config.path_as_array);
    assert!(config.ignore_underscores);
    assert_eq!(config.ignore_keys, Some(vec!["skip".to_string()]));
    assert_eq!(config.details, DetailsConfig::Methods(vec!["push".into()]));

    let (state, log) = observe(json(serde_json::json!({"list": []})), Options::from(config));
    state.set("_x", 1).unwrap();
    state.set("skip", 1).unwrap();
    state.get("list").invoke("push", [Value::from(1)]).unwrap();

    assert_eq!(log.paths(), vec!["list.0"]);
    assert!(log.last().path.is_array());
}

#[test]
fn empty_config_is_the_default() {
    let config: ObserveConfig = toml::from_str("").unwrap();
    assert_eq!(config, ObserveConfig::default());
    assert_eq!(config.details, DetailsConfig::Flag(false));
}

#[test]
fn details_flag_enables_every_method() {
    let config: ObserveConfig = toml::from_str("details = true").unwrap();
    let (state, log) = observe(json(serde_json::json!({"list": [2, 1]})), Options::from(config));

    state.get("list").invoke("reverse", []).unwrap();

    assert_eq!(log.paths(), vec!["list.0", "list.1"]);
    assert!(log.last().apply.is_none());
}
