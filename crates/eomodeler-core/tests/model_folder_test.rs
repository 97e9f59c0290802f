//! Integration tests for loading and saving model folders
//!
//! Tests use temporary directories with real `.eomodeld` fixtures to verify:
//! - Save/load round trips through a model group
//! - Collision handling with and without a failures sink
//! - Prototype resolution across models
//! - Dirty tracking and pending file deletions
//! - Recoverable load failures

use std::cell::RefCell;
use std::fs;
use std::path::Path;
use std::rc::Rc;

use eomodeler_core::model::{ENTITY_EXTENSION, FETCH_SPEC_EXTENSION, INDEX_FILE_NAME};
use eomodeler_core::{
    DatabaseConfig, Entity, Error, Failure, Failures, Join, Model, ModelGroup, ParameterDirection,
    StoredProcedureArgument,
};
use eomodeler_plist::{Dictionary, Value};
use rstest::rstest;
use tempfile::TempDir;

/// Helper to write a model folder from raw file contents.
fn write_model(root: &Path, name: &str, files: &[(&str, &str)]) -> std::path::PathBuf {
    let folder = root.join(format!("{}.eomodeld", name));
    fs::create_dir_all(&folder).unwrap();
    for (file, contents) in files {
        fs::write(folder.join(file), contents).unwrap();
    }
    folder
}

fn shop_model() -> Rc<Model> {
    let model = Model::new("Shop");
    model.set_adaptor_name(Some("JDBC".into()));
    model.set_url(Some("jdbc:postgresql://localhost/shop".into()));
    model.set_username(Some("shop".into()));

    let person = model.add_blank_entity("Person").unwrap();
    person.set_class_name(Some("com.example.shop.Person".into()));
    let id = person.add_blank_attribute("id").unwrap();
    id.set_column_name(Some("ID".into()));
    id.set_external_type(Some("int".into()));
    id.set_primary_key(true);
    let name = person.add_blank_attribute("name").unwrap();
    name.set_column_name(Some("NAME".into()));
    name.set_width(Some(100));
    name.set_class_property(true);

    let address = model.add_blank_entity("Address").unwrap();
    let person_id = address.add_blank_attribute("personID").unwrap();
    person_id.set_column_name(Some("PERSON_ID".into()));

    let addresses = person.add_blank_relationship("addresses").unwrap();
    addresses.set_destination(Some(&address));
    addresses.set_to_many(true);
    addresses.add_join(Join::new("id", "personID"));

    let mut all = Dictionary::new();
    all.insert("entityName".into(), Value::from("Person"));
    person.set_fetch_specification("all", all);

    let totals = model.add_blank_stored_procedure("totals").unwrap();
    let mut argument = StoredProcedureArgument::new("amount");
    argument.direction = ParameterDirection::Out;
    totals.add_argument(argument).unwrap();

    let staging = model.add_blank_database_config("Staging").unwrap();
    staging.set_adaptor_name(Some("JDBC".into()));
    model
}

// =============================================================================
// Round Trip
// =============================================================================

#[test]
fn test_save_and_reopen() {
    let dir = TempDir::new().unwrap();
    let folder = shop_model().save_to_folder(dir.path()).unwrap();
    assert_eq!(folder, dir.path().join("Shop.eomodeld"));
    assert!(folder.join(INDEX_FILE_NAME).is_file());
    assert!(folder.join(format!("Person.{}", FETCH_SPEC_EXTENSION)).is_file());
    assert!(!folder.join(format!("Address.{}", FETCH_SPEC_EXTENSION)).exists());
    assert!(folder.join("totals.storedProcedure").is_file());

    let mut failures = Failures::new();
    let group = ModelGroup::open(dir.path(), &mut failures).unwrap();
    group.resolve(&mut failures);
    assert!(failures.is_empty(), "unexpected failures: {:?}", failures);

    let model = group.model_named("Shop").unwrap();
    assert!(!model.is_dirty());
    assert_eq!(model.adaptor_name().as_deref(), Some("JDBC"));
    assert_eq!(model.username().as_deref(), Some("shop"));
    assert_eq!(model.folder().as_deref(), Some(folder.as_path()));

    let person = model.entity_named("Person").unwrap();
    assert_eq!(person.class_name().as_deref(), Some("com.example.shop.Person"));
    let id = person.attribute_named("id").unwrap();
    assert!(id.primary_key());
    assert_eq!(id.external_type().as_deref(), Some("int"));
    let name = person.attribute_named("name").unwrap();
    assert!(name.class_property());
    assert_eq!(name.width(), Some(100));

    let addresses = person.relationship_named("addresses").unwrap();
    assert!(addresses.to_many());
    assert_eq!(addresses.joins(), vec![Join::new("id", "personID")]);
    assert_eq!(addresses.destination().unwrap().name(), "Address");
    assert_eq!(person.fetch_specification_names(), vec!["all"]);

    let totals = model.stored_procedure_named("totals").unwrap();
    assert_eq!(totals.arguments()[0].direction, ParameterDirection::Out);
    assert!(model.database_config_named("Staging").is_some());
}

#[test]
fn test_unknown_keys_survive_resave() {
    let dir = TempDir::new().unwrap();
    let folder = write_model(
        dir.path(),
        "Legacy",
        &[
            (
                INDEX_FILE_NAME,
                r#"{ EOModelVersion = "2.1"; entities = ({className = Thing; name = Thing; }); vendorKey = kept; }"#,
            ),
            ("Thing.plist", r#"{ name = Thing; className = Thing; legacyFlag = 7; }"#),
        ],
    );
    let mut failures = Failures::new();
    let model = Model::open(&folder, &mut failures).unwrap();
    model.save().unwrap();

    let index = eomodeler_plist::from_file(folder.join(INDEX_FILE_NAME)).unwrap();
    assert_eq!(
        index.as_dictionary().unwrap().get("vendorKey").and_then(Value::as_str),
        Some("kept")
    );
    let thing = eomodeler_plist::from_file(folder.join("Thing.plist")).unwrap();
    assert_eq!(
        thing.as_dictionary().unwrap().get("legacyFlag"),
        Some(&Value::Integer(7))
    );
}

#[rstest]
#[case::integer("2", "2.0")]
#[case::real("2.1", "2.1")]
#[case::quoted("\"2.1\"", "2.1")]
fn test_model_version_formats(#[case] token: &str, #[case] expected: &str) {
    let dir = TempDir::new().unwrap();
    let index = format!("{{ EOModelVersion = {}; entities = (); }}", token);
    let folder = write_model(dir.path(), "Versioned", &[(INDEX_FILE_NAME, index.as_str())]);
    let model = Model::open(&folder, &mut Failures::new()).unwrap();
    assert_eq!(model.version(), expected);
}

// =============================================================================
// Collisions
// =============================================================================

#[test]
fn test_duplicate_with_sink_renames_once() {
    let model = Model::new("Shop");
    let original = model.add_blank_entity("Person").unwrap();
    let mut failures = Failures::new();
    model
        .add_entity(&Entity::new("Person"), true, Some(&mut failures))
        .unwrap();

    assert_eq!(failures.len(), 1);
    assert!(failures[0].is_rename());
    assert_eq!(original.name(), "Person1");
    let mut names: Vec<String> = model.entities().iter().map(|e| e.name()).collect();
    names.sort();
    assert_eq!(names, vec!["Person", "Person1"]);
}

#[test]
fn test_find_unused_name_skips_taken() {
    let group = ModelGroup::new();
    let model = group.add_blank_model("Shop").unwrap();
    model.add_blank_entity("Foo").unwrap();
    model.add_blank_entity("Foo2").unwrap();
    assert_eq!(model.find_unused_entity_name("Foo").unwrap(), "Foo1");
    assert_eq!(model.find_unused_entity_name("Bar").unwrap(), "Bar");
}

#[test]
fn test_cross_model_duplicate_during_load() {
    let dir = TempDir::new().unwrap();
    let entity = r#"{ name = Person; className = Person; }"#;
    let index = r#"{ EOModelVersion = "2.1"; entities = ({className = Person; name = Person; }); }"#;
    write_model(dir.path(), "A", &[(INDEX_FILE_NAME, index), ("Person.plist", entity)]);
    write_model(dir.path(), "B", &[(INDEX_FILE_NAME, index), ("Person.plist", entity)]);

    let mut failures = Failures::new();
    let group = ModelGroup::open(dir.path(), &mut failures).unwrap();
    assert_eq!(group.models().len(), 2);
    assert_eq!(group.entities().len(), 1);
    assert!(matches!(
        &failures[..],
        [Failure::DuplicateAcrossModels { model, other_model, .. }] if model == "B" && other_model == "A"
    ));
}

// =============================================================================
// Prototypes
// =============================================================================

#[test]
fn test_prototype_first_definition_wins_across_models() {
    let group = ModelGroup::new();
    let prototypes = group.add_blank_model("Prototypes").unwrap();
    let shop = group.add_blank_model("Shop").unwrap();
    shop.set_adaptor_name(Some("JDBC".into()));

    let defaults = prototypes.add_blank_entity("EOPrototypes").unwrap();
    defaults
        .add_blank_attribute("id")
        .unwrap()
        .set_external_type(Some("int".into()));
    let jdbc = prototypes.add_blank_entity("EOJDBCPrototypes").unwrap();
    jdbc.add_blank_attribute("id")
        .unwrap()
        .set_external_type(Some("bigint".into()));
    jdbc.add_blank_attribute("date")
        .unwrap()
        .set_external_type(Some("timestamp".into()));

    assert_eq!(shop.prototype_attribute_names(), vec!["date", "id"]);
    let id = shop.prototype_attribute_named("id").unwrap();
    assert_eq!(id.external_type().as_deref(), Some("int"));
    assert_eq!(
        shop.preferred_prototype_entity().map(|e| e.name()).as_deref(),
        Some("EOJDBCPrototypes")
    );
}

// =============================================================================
// Dirty Tracking and Deletions
// =============================================================================

#[test]
fn test_save_does_not_clear_dirty() {
    let dir = TempDir::new().unwrap();
    let folder = shop_model().save_to_folder(dir.path()).unwrap();
    let model = Model::open(&folder, &mut Failures::new()).unwrap();
    assert!(!model.is_dirty());

    model.entity_named("Person").unwrap().set_read_only(true);
    assert!(model.is_dirty());
    model.save().unwrap();
    assert!(model.is_dirty());
}

#[test]
fn test_removed_entity_files_deleted_on_save() {
    let dir = TempDir::new().unwrap();
    let folder = shop_model().save_to_folder(dir.path()).unwrap();
    let model = Model::open(&folder, &mut Failures::new()).unwrap();

    let person = model.entity_named("Person").unwrap();
    assert!(model.remove_entity(&person));
    model.save().unwrap();
    assert!(!folder.join(format!("Person.{}", ENTITY_EXTENSION)).exists());
    assert!(!folder.join(format!("Person.{}", FETCH_SPEC_EXTENSION)).exists());
    assert!(folder.join(format!("Address.{}", ENTITY_EXTENSION)).exists());
}

#[test]
fn test_readding_entity_cancels_deletion() {
    let dir = TempDir::new().unwrap();
    let folder = shop_model().save_to_folder(dir.path()).unwrap();
    let model = Model::open(&folder, &mut Failures::new()).unwrap();

    let person = model.entity_named("Person").unwrap();
    model.remove_entity(&person);
    model.add_entity(&person, true, None).unwrap();
    assert!(model.pending_entity_deletions().is_empty());
    model.save().unwrap();
    assert!(folder.join(format!("Person.{}", ENTITY_EXTENSION)).exists());
}

#[test]
fn test_renamed_entity_file_replaced() {
    let dir = TempDir::new().unwrap();
    let folder = shop_model().save_to_folder(dir.path()).unwrap();
    let model = Model::open(&folder, &mut Failures::new()).unwrap();
    model.entity_named("Person").unwrap().set_name("Customer").unwrap();
    model.save().unwrap();

    assert!(!folder.join("Person.plist").exists());
    assert!(folder.join("Customer.plist").exists());
    assert_eq!(model.deleted_entity_names_in_object_store(), vec!["Person"]);
}

#[test]
fn test_blank_entities_in_detached_model() {
    let model = Model::new("Shop");
    let person = model.add_blank_entity("Person").unwrap();
    let person1 = model.add_blank_entity("Person").unwrap();
    assert_eq!(person.name(), "Person");
    assert_eq!(person1.name(), "Person1");
    assert_eq!(person1.class_name().as_deref(), Some("Person1"));
}

// =============================================================================
// Load Failures
// =============================================================================

#[test]
fn test_missing_entity_file_recorded() {
    let dir = TempDir::new().unwrap();
    let folder = write_model(
        dir.path(),
        "Shop",
        &[(
            INDEX_FILE_NAME,
            r#"{ EOModelVersion = "2.1"; entities = ({className = Person; name = Person; }); }"#,
        )],
    );
    let mut failures = Failures::new();
    let model = Model::open(&folder, &mut failures).unwrap();
    assert!(model.entities().is_empty());
    assert!(matches!(&failures[..], [Failure::MissingFile { kind: "entity", .. }]));
}

#[test]
fn test_missing_index_fails() {
    let dir = TempDir::new().unwrap();
    let folder = write_model(dir.path(), "Empty", &[]);
    let err = Model::open(&folder, &mut Failures::new()).unwrap_err();
    assert!(matches!(err, Error::ModelLoad { .. }));
}

#[test]
fn test_broken_model_skipped_by_group() {
    let dir = TempDir::new().unwrap();
    write_model(dir.path(), "Broken", &[(INDEX_FILE_NAME, "{ unterminated")]);
    shop_model().save_to_folder(dir.path()).unwrap();

    let mut failures = Failures::new();
    let group = ModelGroup::open(dir.path(), &mut failures).unwrap();
    assert_eq!(group.models().len(), 1);
    assert!(matches!(&failures[..], [Failure::UnreadableFile { .. }]));
}

// =============================================================================
// Settings and Notification
// =============================================================================

#[test]
fn test_group_settings_file() {
    let dir = TempDir::new().unwrap();
    fs::write(
        dir.path().join("eomodeler.yaml"),
        "default_prototype_entity: MyPrototypes\nrecursive: false\n",
    )
    .unwrap();
    let nested = dir.path().join("nested");
    fs::create_dir_all(&nested).unwrap();
    shop_model().save_to_folder(&nested).unwrap();

    let group = ModelGroup::open(dir.path(), &mut Failures::new()).unwrap();
    assert!(group.models().is_empty());
    let model = group.add_blank_model("Shop").unwrap();
    assert_eq!(model.default_prototype_entity_name(), "MyPrototypes");
}

#[test]
fn test_invalid_settings_rejected() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("eomodeler.yaml"), "max_unused_name_attempts: 0\n").unwrap();
    let err = ModelGroup::open(dir.path(), &mut Failures::new()).unwrap_err();
    assert!(matches!(err, Error::ConfigInvalid { .. }));
}

#[test]
fn test_listener_sees_consistent_snapshots() {
    let model = Model::new("Shop");
    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&seen);
    model.notifier().subscribe(Model::ENTITIES, move |change| {
        sink.borrow_mut().push((change.old.len(), change.new.len()));
    });

    let person = model.add_blank_entity("Person").unwrap();
    model.add_blank_entity("Address").unwrap();
    model.remove_entity(&person);
    assert_eq!(
        *seen.borrow(),
        vec![(Some(0), Some(1)), (Some(1), Some(2)), (Some(2), Some(1))]
    );
}

#[test]
fn test_default_config_edits_do_not_dirty() {
    let model = Model::new("Shop");
    let default = model.database_config_named(DatabaseConfig::DEFAULT_NAME).unwrap();
    default.set_adaptor_name(Some("JDBC".into()));
    assert!(!model.is_dirty());
    assert_eq!(model.adaptor_name(), None);
}
