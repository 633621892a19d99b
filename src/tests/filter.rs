use crate::{
    Error, Result,
    engine::{FilterSet, TypeTag},
};

#[test]
fn empty_filter_admits_everything() {
    let filter = FilterSet::new();

    assert!(filter.passes_key(0, b"any", TypeTag::String));
    assert!(filter.passes_key(7, b"other", TypeTag::Stream));
    assert!(filter.passes_command(None, None));
}

#[test]
fn db_membership() {
    let filter = FilterSet::new().dbs([0, 2]);

    assert!(filter.passes_key(0, b"k", TypeTag::String));
    assert!(filter.passes_key(2, b"k", TypeTag::String));
    assert!(!filter.passes_key(1, b"k", TypeTag::String));

    assert!(!filter.passes_command(Some(1), None));
    // a command with an unknown database cannot be judged and passes
    assert!(filter.passes_command(None, None));
}

#[test]
fn type_membership() {
    let filter = FilterSet::new().types([TypeTag::String, TypeTag::Hash]);

    assert!(filter.passes_key(0, b"k", TypeTag::String));
    assert!(!filter.passes_key(0, b"k", TypeTag::SortedSet));

    // the type predicate does not apply to replicated commands
    assert!(filter.passes_command(Some(0), Some(b"k")));
}

#[test]
fn key_patterns_any_match() -> Result<()> {
    let filter = FilterSet::new().key_pattern_strs(["^user\\.", "^session:"])?;

    assert!(filter.passes_key(0, b"user.profile", TypeTag::Hash));
    assert!(filter.passes_key(0, b"session:42", TypeTag::String));
    assert!(!filter.passes_key(0, b"orders", TypeTag::String));

    assert!(filter.passes_command(Some(0), Some(b"user.profile")));
    assert!(!filter.passes_command(Some(0), Some(b"orders")));

    Ok(())
}

#[test]
fn predicates_combine_conjunctively() -> Result<()> {
    let filter = FilterSet::new()
        .dbs([0])
        .types([TypeTag::String])
        .key_pattern_strs(["^user\\."])?;

    // each predicate admits it
    assert!(filter.passes_key(0, b"user.name", TypeTag::String));

    // rejected by exactly one predicate
    assert!(!filter.passes_key(1, b"user.name", TypeTag::String));
    assert!(!filter.passes_key(0, b"user.profile", TypeTag::Hash));
    assert!(!filter.passes_key(0, b"orders", TypeTag::String));

    Ok(())
}

#[test]
fn invalid_pattern_is_a_config_error() {
    assert!(matches!(
        FilterSet::new().key_pattern_strs(["["]),
        Err(Error::Config(_))
    ));
}
