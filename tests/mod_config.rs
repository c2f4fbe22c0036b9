use std::collections::HashMap;
use std::path::PathBuf;

use firestore_driver::config::{ConfigLayer, candidate_paths, load_config};
use firestore_driver::{Connection, DbError};

fn write(dir: &tempfile::TempDir, name: &str, body: &str) -> PathBuf {
    let p = dir.path().join(name);
    std::fs::write(&p, body).unwrap();
    p
}

#[test]
fn cli_layer_beats_config_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = write(&dir, "c.toml", "prefix = \"file_\"\ndatabase = \"tenant-a\"\n");
    let cli = ConfigLayer { prefix: Some("cli_".into()), ..ConfigLayer::default() };
    let cfg = load_config(cli, Some(path.as_path())).unwrap();
    assert_eq!(cfg.prefix, "cli_");
    assert_eq!(cfg.database, "tenant-a");
    assert_eq!(cfg.health_check_collection, "health_check");
}

#[test]
fn environment_sits_between_cli_and_file() {
    let env: HashMap<&str, &str> =
        HashMap::from([("FIRESTORE_DATABASE", "from-env"), ("FIRESTORE_PREFIX", "env_")]);
    let mut layer = ConfigLayer { prefix: Some("cli_".into()), ..ConfigLayer::default() };
    layer.fill_from(ConfigLayer::from_env_with(|k| env.get(k).map(|v| (*v).to_string())));
    layer.fill_from(
        ConfigLayer::from_toml_str("database = \"from-file\"\nproject_id = \"p\"").unwrap(),
    );
    let cfg = layer.finish();
    assert_eq!(cfg.prefix, "cli_");
    assert_eq!(cfg.database, "from-env");
    assert_eq!(cfg.project_id.as_deref(), Some("p"));
}

#[test]
fn missing_explicit_file_is_an_error() {
    let err = load_config(ConfigLayer::default(), Some(std::path::Path::new("/no/such/file.toml")))
        .unwrap_err();
    assert!(matches!(err, DbError::Config(_)));
}

#[test]
fn malformed_file_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = write(&dir, "bad.toml", "prefix = [unterminated");
    assert!(matches!(load_config(ConfigLayer::default(), Some(path.as_path())), Err(DbError::Config(_))));
}

#[test]
fn explicit_path_is_consulted_first() {
    let p = PathBuf::from("/tmp/explicit.toml");
    assert_eq!(candidate_paths(Some(p.as_path())).first(), Some(&p));
}

#[test]
fn fixture_from_config_seeds_the_store() {
    let dir = tempfile::tempdir().unwrap();
    let fixture = write(&dir, "seed.json", r#"{"users": [{"id": "a"}, {"id": "b"}], "posts": []}"#);
    let path = write(&dir, "c.toml", &format!("fixture = {:?}\n", fixture.display().to_string()));
    let cfg = load_config(ConfigLayer::default(), Some(path.as_path())).unwrap();
    let conn = Connection::in_memory(cfg).unwrap();
    assert_eq!(conn.table("users").count().unwrap(), 2);
}

#[test]
fn bad_fixture_fails_connection() {
    let dir = tempfile::tempdir().unwrap();
    let fixture = write(&dir, "seed.json", r#"[1, 2]"#);
    let cli = ConfigLayer { fixture: Some(fixture), ..ConfigLayer::default() };
    let cfg = cli.finish();
    assert!(matches!(Connection::in_memory(cfg), Err(DbError::InvalidArgument(_))));
}
