use sqlcraft::{ColumnType, Entity, FieldKind, SqlValue, find_entity, registered_entities};

#[derive(Debug, Default, Entity)]
#[orm(table = "accounts")]
struct Account {
    #[orm(id, column = "account_id")]
    key: uuid::Uuid,
    #[orm(column)]
    owner: String,
    #[orm(column)]
    balance: Option<i64>,
    #[orm(column)]
    active: bool,
    cache: Vec<String>,
}

#[derive(Debug, Default, Entity)]
#[orm(table = "wrapped")]
struct Wrapped<T: ColumnType + Default> {
    #[orm(column)]
    id: uuid::Uuid,
    #[orm(column)]
    value: T,
}

fn assert_entity<E: Entity>() -> Vec<&'static str> {
    E::columns()
}

#[test]
fn derived_entities_are_registered() {
    let reg = find_entity("accounts").expect("accounts is registered");
    assert_eq!(reg.type_name, "Account");
    assert_eq!(reg.id_column, Some("account_id"));
    assert_eq!(
        reg.columns().collect::<Vec<_>>(),
        ["account_id", "owner", "balance", "active"]
    );
    assert!(registered_entities().any(|r| r.table == "accounts"));
    assert!(find_entity("missing").is_none());
}

#[test]
fn field_kinds_follow_rust_types() {
    let kinds: Vec<_> = Account::FIELDS.iter().map(|f| (f.kind, f.nullable)).collect();
    assert_eq!(
        kinds,
        [
            (FieldKind::Uuid, false),
            (FieldKind::Text, false),
            (FieldKind::Integer, true),
            (FieldKind::Boolean, false),
        ]
    );
    assert_eq!(Account::uuid_id_column().unwrap(), "account_id");
}

#[test]
fn explicit_identity_is_used_for_writes() {
    let mut account = Account::default();
    assert!(account.assign_id(uuid::Uuid::new_v4()));
    assert!(!account.key.is_nil());
    assert_eq!(account.identity_uuid(), Some(account.key));
    assert!(!account.touch_created_at(chrono::Utc::now()));
}

#[test]
fn generic_entities_derive_but_do_not_register() {
    assert_eq!(assert_entity::<Wrapped<i64>>(), ["id", "value"]);
    assert_eq!(Wrapped::<i64>::FIELDS[1].kind, FieldKind::Integer);
    assert_eq!(Wrapped::<String>::FIELDS[1].kind, FieldKind::Text);

    let wrapped = Wrapped {
        id: uuid::Uuid::nil(),
        value: 0.5_f64,
    };
    assert_eq!(wrapped.values()[1], SqlValue::Float(0.5));
    assert!(find_entity("wrapped").is_none());
}
