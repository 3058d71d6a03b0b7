use mindloom_core::canon::{normalize_value, Canonicalizer};

#[test]
fn case_punctuation_and_plural_forms_share_a_key() {
    let canon = Canonicalizer::new();
    assert_eq!(canon.key("Dogs"), canon.key("dog"));
    assert_eq!(canon.key("To Do"), canon.key("todo"));
    assert_eq!(canon.key("Hello, World!"), canon.key("helloworld"));
    assert_eq!(canon.key("Berries"), canon.key("berry"));
}

#[test]
fn metaprogramming_marker_separates_keys() {
    let canon = Canonicalizer::new();
    assert_ne!(canon.key("=test"), canon.key("test"));
    assert!(canon.normalize("=test").starts_with('='));
}

#[test]
fn markup_tags_are_stripped() {
    assert_eq!(normalize_value("<b>Chores</b>"), normalize_value("chore"));
}

#[test]
fn emoji_only_values_keep_their_emoji() {
    let apple = normalize_value("\u{1F34E}");
    let orange = normalize_value("\u{1F34A}");
    assert!(!apple.is_empty());
    assert!(!orange.is_empty());
    assert_ne!(apple, orange);
}

#[test]
fn mixed_values_drop_their_emoji() {
    assert_eq!(normalize_value("party \u{1F389}"), normalize_value("Parties"));
}

#[test]
fn all_punctuation_values_do_not_collapse_to_empty() {
    assert!(!normalize_value(":-)").is_empty());
    assert!(!normalize_value("!!!").is_empty());
}

#[test]
fn reserved_s_survives_singularization() {
    assert_eq!(normalize_value("s"), "s");
    assert_eq!(normalize_value("S"), "s");
}

#[test]
fn normalization_is_deterministic_across_calls() {
    let canon = Canonicalizer::new();
    let first = canon.canonicalize("Running Shoes!");
    let second = canon.canonicalize("Running Shoes!");
    assert_eq!(first, second);
    assert_eq!(first.text, normalize_value("Running Shoes!"));
}
