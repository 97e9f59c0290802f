use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use rstest::rstest;

fn create_shop(dir: &std::path::Path) {
    cargo_bin_cmd!("eomodeler")
        .args(["new", dir.to_str().unwrap(), "Shop", "-e", "Person", "-e", "Person"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Shop.eomodeld"));
}

#[test]
fn test_new_show_and_verify() {
    let dir = tempfile::tempdir().unwrap();
    create_shop(dir.path());

    let folder = dir.path().join("Shop.eomodeld");
    assert!(folder.join("index.eomodeld").exists());
    assert!(folder.join("Person.plist").exists());
    assert!(folder.join("Person1.plist").exists());

    cargo_bin_cmd!("eomodeler")
        .args(["show", dir.path().to_str().unwrap()])
        .assert()
        .success()
        .stdout(predicate::str::contains("Shop (version 2.1"))
        .stdout(predicate::str::contains("Person1 [Person1]"));

    cargo_bin_cmd!("eomodeler")
        .args(["verify", dir.path().to_str().unwrap()])
        .assert()
        .success();
}

#[test]
fn test_new_refuses_existing_model() {
    let dir = tempfile::tempdir().unwrap();
    create_shop(dir.path());

    cargo_bin_cmd!("eomodeler")
        .args(["new", dir.path().to_str().unwrap(), "Shop"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("already exists"));
}

#[test]
fn test_show_json() {
    let dir = tempfile::tempdir().unwrap();
    create_shop(dir.path());

    let output = cargo_bin_cmd!("eomodeler")
        .args(["show", dir.path().to_str().unwrap(), "--json"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["Shop"]["index"]["EOModelVersion"], "2.1");
    assert_eq!(json["Shop"]["entities"]["Person"]["name"], "Person");
    assert_eq!(json["Shop"]["entities"]["Person1"]["externalName"], "Person1");
}

#[test]
fn test_verify_reports_dangling_destination() {
    let dir = tempfile::tempdir().unwrap();
    let folder = dir.path().join("Broken.eomodeld");
    std::fs::create_dir_all(&folder).unwrap();
    std::fs::write(
        folder.join("index.eomodeld"),
        r#"{ EOModelVersion = "2.1"; entities = ({className = Person; name = Person; }); }"#,
    )
    .unwrap();
    std::fs::write(
        folder.join("Person.plist"),
        r#"{
            name = Person;
            className = Person;
            attributes = ({name = id; columnName = ID; });
            relationships = ({name = orders; destination = Order; isToMany = Y;
                joins = ({sourceAttribute = id; destinationAttribute = personID; }); });
        }"#,
    )
    .unwrap();

    cargo_bin_cmd!("eomodeler")
        .args(["verify", dir.path().to_str().unwrap()])
        .assert()
        .failure()
        .stdout(predicate::str::contains(
            "Broken.Person.orders: destination entity 'Order' does not exist",
        ));
}

#[rstest]
#[case::all_models(None)]
#[case::one_model(Some("Shop"))]
fn test_resave(#[case] model: Option<&str>) {
    let dir = tempfile::tempdir().unwrap();
    create_shop(dir.path());
    let mut args = vec!["resave", dir.path().to_str().unwrap()];
    if let Some(model) = model {
        args.extend(["--model", model]);
    }

    cargo_bin_cmd!("eomodeler")
        .args(&args)
        .assert()
        .success()
        .stdout(predicate::str::contains("Saved"));
}

#[test]
fn test_unknown_model_fails() {
    let dir = tempfile::tempdir().unwrap();
    create_shop(dir.path());

    cargo_bin_cmd!("eomodeler")
        .args(["show", dir.path().to_str().unwrap(), "--model", "Billing"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("No model named 'Billing'"));
}
