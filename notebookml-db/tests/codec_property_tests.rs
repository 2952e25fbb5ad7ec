//! Property tests for the metadata codec and identifiers.

use chrono::DateTime;
use notebookml_db::{
    DataKind, DataMeta, EntityKind, EntityMeta, MICROSECOND_RANGE_SECS, MetaData, SourceKind,
    SourceMeta, Timestamp, flatten, meta_identifier, reconstruct, unflatten,
};
use proptest::prelude::*;

/// Roughly the span chrono can represent.
const FAR_SECS: i64 = 8_000_000_000_000;

/// Timestamps at nanosecond input precision, mostly inside the microsecond
/// range and sometimes far outside it.
fn arb_timestamp() -> impl Strategy<Value = Timestamp> {
    let secs = prop_oneof![
        3 => -MICROSECOND_RANGE_SECS + 1..MICROSECOND_RANGE_SECS,
        1 => -FAR_SECS..FAR_SECS,
    ];
    (secs, 0u32..1_000_000_000)
        .prop_map(|(secs, nanos)| DateTime::from_timestamp(secs, nanos).unwrap().into())
}

fn arb_entity_kind() -> impl Strategy<Value = EntityKind> {
    prop_oneof![Just(EntityKind::Undef), Just(EntityKind::User), Just(EntityKind::Agent)]
}

fn arb_source_kind() -> impl Strategy<Value = SourceKind> {
    prop_oneof![Just(SourceKind::User), Just(SourceKind::Document), Just(SourceKind::Website)]
}

fn arb_data_kind() -> impl Strategy<Value = DataKind> {
    prop_oneof![Just(DataKind::Data), Just(DataKind::Content)]
}

fn arb_entity() -> impl Strategy<Value = EntityMeta> {
    (arb_timestamp(), arb_entity_kind(), "[a-zA-Z0-9 _-]{0,12}", "[a-z0-9-]{0,16}").prop_map(
        |(created_datetime, kind, name, id)| EntityMeta { created_datetime, kind, name, id },
    )
}

fn arb_source() -> impl Strategy<Value = SourceMeta> {
    let reference = "[a-z0-9./#]{0,20}";
    let url = "(https://[a-z]{1,10}\\.com/[a-z]{0,8})?";
    (arb_timestamp(), arb_source_kind(), reference, url)
        .prop_map(|(created_datetime, kind, reference, url)| SourceMeta {
            created_datetime,
            kind,
            reference,
            url,
        })
}

fn arb_data_meta() -> impl Strategy<Value = DataMeta> {
    (arb_timestamp(), arb_data_kind(), arb_entity(), arb_entity(), arb_source()).prop_map(
        |(created_datetime, kind, owner, creator, source)| DataMeta {
            created_datetime,
            kind,
            owner,
            creator,
            source,
        },
    )
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// Flattening then reconstructing yields a structurally equal record.
    #[test]
    fn reconstruct_flatten_roundtrip(meta in arb_data_meta()) {
        let flat = flatten(&meta);
        prop_assert_eq!(flat.len(), 14);
        let restored = reconstruct::<DataMeta>(&flat).unwrap();
        prop_assert_eq!(restored, meta);
    }

    /// The unflattened attribute map matches the nested serialization and
    /// deserializes to the same record.
    #[test]
    fn unflatten_agrees_with_serialize(meta in arb_data_meta()) {
        let nested = unflatten(&flatten(&meta)).unwrap();
        prop_assert_eq!(&nested, &meta.to_value().unwrap());
        prop_assert_eq!(DataMeta::from_value(nested).unwrap(), meta);
    }

    /// Equal records share an identifier; it only depends on field values.
    #[test]
    fn identifier_is_deterministic(meta in arb_data_meta()) {
        let copy = reconstruct::<DataMeta>(&flatten(&meta)).unwrap();
        prop_assert_eq!(meta_identifier(&meta).unwrap(), meta_identifier(&copy).unwrap());
    }

    /// Changing the creator id changes the identifier.
    #[test]
    fn identifier_tracks_creator_id(meta in arb_data_meta(), suffix in "[a-z]{1,4}") {
        let mut changed = meta.clone();
        changed.creator.id.push_str(&suffix);
        prop_assert_ne!(meta_identifier(&meta).unwrap(), meta_identifier(&changed).unwrap());
    }
}
