use serde_json::json;
use vexil_domain::{Channel, FlagDefinition, FlagKind, Platform, SkipCondition, VisibilityRule};

#[test]
fn definitions_deserialize_from_tagged_kinds() {
    let raw = json!([
        {
            "internal_name": "x",
            "supported_platforms": ["desktop"],
            "kind": { "type": "single", "switch": { "name": "x" } }
        },
        {
            "internal_name": "y",
            "supported_platforms": 7,
            "expiry_milestone": 120,
            "tags": ["gpu"],
            "kind": {
                "type": "feature_with_params",
                "feature": "FeatureY",
                "trial_name": "TrialY",
                "variations": [{ "name": "fast", "params": [{ "name": "mode", "value": "fast" }] }]
            }
        },
        {
            "internal_name": "z",
            "supported_platforms": ["android"],
            "kind": {
                "type": "multi",
                "choices": [
                    { "label": "Default" },
                    { "label": "Low", "switch": { "name": "z-level", "value": "1" } }
                ]
            }
        }
    ]);

    let defs: Vec<FlagDefinition> = serde_json::from_value(raw).expect("definitions");
    assert_eq!(defs[0].supported_platforms, Platform::DESKTOP);
    assert!(matches!(&defs[0].kind, FlagKind::Single { switch } if switch.name == "x" && switch.value.is_empty()));

    assert_eq!(defs[1].supported_platforms, Platform::MAC | Platform::WINDOWS | Platform::LINUX);
    assert_eq!(defs[1].expiry_milestone, Some(120));
    assert!(defs[1].has_tag("gpu"));
    assert_eq!(defs[1].feature_name(), Some("FeatureY"));
    assert_eq!(defs[1].num_options(), 4);

    assert_eq!(defs[2].num_options(), 2);
    assert_eq!(defs[2].option_label(1), "Low");
}

#[test]
fn unknown_platform_names_are_rejected() {
    let err = serde_json::from_value::<Platform>(json!(["mac", "macos"])).unwrap_err();
    assert!(err.to_string().contains("unknown platform `macos`"), "got {err}");

    assert_eq!(serde_json::from_value::<Platform>(json!([" Mac ", "ios"])).unwrap(), Platform::MAC | Platform::IOS);
    assert_eq!(Platform::from_name("mobile"), Some(Platform::MOBILE));
    assert_eq!(Platform::from_name("typo"), None);
}

#[test]
fn platform_serializes_as_names() {
    let value = serde_json::to_value(Platform::MAC | Platform::IOS).expect("serialize");
    assert_eq!(value, json!(["mac", "ios"]));
}

#[test]
fn materialization_mask_adds_owner_only_on_chromeos() {
    assert!(Platform::CHROMEOS.materialization_mask().contains(Platform::CHROMEOS_OWNER_ONLY));
    assert_eq!(Platform::LINUX.materialization_mask(), Platform::LINUX);
}

#[test]
fn rules_deserialize_with_condition_tag() {
    let raw = json!([
        { "target": { "tag": "policy" }, "condition": { "when": "policy_carrier" } },
        { "target": { "name": "x" }, "condition": { "when": "max_channel", "channel": "dev" } }
    ]);
    let rules: Vec<VisibilityRule> = serde_json::from_value(raw).expect("rules");
    assert_eq!(rules[0], VisibilityRule::for_tag("policy", SkipCondition::PolicyCarrier));
    assert_eq!(
        rules[1],
        VisibilityRule::for_name("x", SkipCondition::MaxChannel { channel: Channel::Dev })
    );
    assert!(!rules[0].condition.bypassed_by_show_all());
    assert!(rules[1].condition.bypassed_by_show_all());
}

#[test]
fn channels_order_by_stability() {
    assert!(Channel::Canary < Channel::Dev);
    assert!(Channel::Beta < Channel::Stable);
    assert!(Channel::Beta.is_pre_stable());
    assert!(!Channel::Stable.is_pre_stable());
}
