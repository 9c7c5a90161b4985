use assert_cmd::Command;
use clap::Parser;
use rstest::{fixture, rstest};
use serde_json::{Value, json};
use stac_map_cli::StacMap;
use std::{path::Path, time::Duration};
use tempfile::TempDir;
use tracing::Level;

#[fixture]
fn command() -> Command {
    assert_cmd::cargo::cargo_bin_cmd!("stac-map")
}

/// A catalog with one readable and one missing collection.
#[fixture]
fn catalog() -> TempDir {
    let tempdir = TempDir::new().unwrap();
    write_json(
        tempdir.path(),
        "catalog.json",
        json!({
            "type": "Catalog",
            "id": "root",
            "description": "A catalog",
            "links": [
                {"rel": "self", "href": "./catalog.json"},
                {"rel": "child", "href": "./europe/collection.json"},
                {"rel": "child", "href": "./missing/collection.json"}
            ]
        }),
    );
    std::fs::create_dir(tempdir.path().join("europe")).unwrap();
    write_json(
        tempdir.path(),
        "europe/collection.json",
        json!({
            "type": "Collection",
            "id": "europe",
            "description": "Somewhere in Europe",
            "license": "CC-BY-4.0",
            "extent": {
                "spatial": {"bbox": [[0.0, 40.0, 10.0, 50.0]]},
                "temporal": {"interval": [["2020-01-01T00:00:00Z", "2020-12-31T23:59:59Z"]]}
            },
            "links": [],
            "assets": {"thumbnail": {"href": "./thumbnail.png"}}
        }),
    );
    tempdir
}

fn write_json(directory: &Path, name: &str, value: Value) {
    std::fs::write(directory.join(name), serde_json::to_vec(&value).unwrap()).unwrap();
}

fn stdout_json(command: &mut Command) -> Value {
    let output = command.assert().success().get_output().stdout.clone();
    serde_json::from_slice(&output).unwrap()
}

fn items_parquet(tempdir: &TempDir) -> String {
    let href = tempdir
        .path()
        .join("items.parquet")
        .to_string_lossy()
        .into_owned();
    let connection = duckdb::Connection::open_in_memory().unwrap();
    connection
        .execute_batch(&format!(
            "INSTALL spatial;
            LOAD spatial;
            COPY (
                SELECT * FROM (VALUES
                    ('a', ST_Point(1, 2), '2020-01-01T00:00:00Z'::TIMESTAMPTZ),
                    ('b', ST_Point(3, 4), '2021-06-01T00:00:00Z'::TIMESTAMPTZ)
                ) AS t(id, geometry, datetime)
            ) TO '{href}' (FORMAT PARQUET)"
        ))
        .unwrap();
    href
}

#[test]
fn global_options() {
    let stac_map = StacMap::parse_from(["stac-map", "resolve", "catalog.json"]);
    let options = stac_map.fetcher_options();
    assert_eq!(options.timeout, Duration::from_secs(30));
    assert_eq!(options.retries, 1);
    assert_eq!(stac_map.log_level(), Some(Level::ERROR));

    let stac_map = StacMap::parse_from([
        "stac-map",
        "--timeout",
        "5",
        "--retries",
        "3",
        "-vv",
        "resolve",
        "catalog.json",
    ]);
    let options = stac_map.fetcher_options();
    assert_eq!(options.timeout, Duration::from_secs(5));
    assert_eq!(options.retries, 3);
    assert_eq!(stac_map.log_level(), Some(Level::INFO));

    let stac_map = StacMap::parse_from(["stac-map", "-q", "resolve", "catalog.json"]);
    assert_eq!(stac_map.log_level(), None);
}

#[test]
fn negative_bbox() {
    let _ = StacMap::try_parse_from([
        "stac-map",
        "search",
        "https://stac.test",
        "--bbox",
        "-10,-20,10,20",
        "--collections",
        "a,b",
    ])
    .unwrap();
    let _ = StacMap::try_parse_from([
        "stac-map",
        "children",
        "catalog.json",
        "--bbox",
        "not,a,bbox",
    ])
    .unwrap_err();
}

#[rstest]
fn resolve(mut command: Command, catalog: TempDir) {
    let value = stdout_json(
        command
            .arg("resolve")
            .arg(catalog.path().join("europe/collection.json")),
    );
    assert_eq!(value["id"], "europe");
    let thumbnail = value["assets"]["thumbnail"]["href"].as_str().unwrap();
    assert!(thumbnail.starts_with("file://"), "{thumbnail}");
    assert!(thumbnail.ends_with("/europe/thumbnail.png"), "{thumbnail}");
}

#[rstest]
fn resolve_missing(mut command: Command) {
    let tempdir = TempDir::new().unwrap();
    command
        .arg("resolve")
        .arg(tempdir.path().join("nope.json"))
        .assert()
        .failure();
}

#[rstest]
fn children(mut command: Command, catalog: TempDir) {
    let value = stdout_json(
        command
            .arg("children")
            .arg(catalog.path().join("catalog.json"))
            .arg("--compact-json")
            .arg("true"),
    );
    assert_eq!(value["collections"].as_array().unwrap().len(), 1);
    assert_eq!(value["collections"][0]["id"], "europe");
    let errors = value["errors"].as_array().unwrap();
    assert_eq!(errors.len(), 1);
    assert!(
        errors[0]["href"]
            .as_str()
            .unwrap()
            .ends_with("/missing/collection.json")
    );
}

#[rstest]
#[case::inside("5,45,6,46", None, 1)]
#[case::outside("-100,10,-90,20", None, 0)]
#[case::before("-180,-90,180,90", Some("2018-01-01/2018-12-31"), 0)]
#[case::open_end("-180,-90,180,90", Some("2020-06-01/.."), 1)]
fn children_filters(
    mut command: Command,
    catalog: TempDir,
    #[case] bbox: &str,
    #[case] datetime: Option<&str>,
    #[case] count: usize,
) {
    let _ = command
        .arg("children")
        .arg(catalog.path().join("catalog.json"))
        .arg("--bbox")
        .arg(bbox);
    if let Some(datetime) = datetime {
        let _ = command.arg("--datetime").arg(datetime);
    }
    let value = stdout_json(&mut command);
    assert_eq!(value["collections"].as_array().unwrap().len(), count);
}

#[rstest]
fn collections_without_listing(mut command: Command, catalog: TempDir) {
    command
        .arg("collections")
        .arg(catalog.path().join("catalog.json"))
        .assert()
        .failure();
}

#[rstest]
fn search_without_link(mut command: Command, catalog: TempDir) {
    command
        .arg("search")
        .arg(catalog.path().join("catalog.json"))
        .assert()
        .failure();
}

#[rstest]
fn parquet(catalog: TempDir) {
    let href = items_parquet(&catalog);

    let metadata = stdout_json(command().args(["parquet", "metadata", &href]));
    assert_eq!(metadata["count"], 2);

    let schema = stdout_json(command().args(["parquet", "schema", &href]));
    assert_eq!(schema[0]["name"], "id");

    let table = stdout_json(command().args(["parquet", "table", &href]));
    assert_eq!(table["features"].as_array().unwrap().len(), 2);
    assert_eq!(table["features"][1]["geometry"]["coordinates"], json!([3.0, 4.0]));

    let table = stdout_json(command().args(["parquet", "table", &href, "--datetime", "2021-01-01/.."]));
    assert_eq!(table["features"].as_array().unwrap().len(), 1);
    assert_eq!(table["features"][0]["id"], "b");

    let item = stdout_json(command().args(["parquet", "item", &href, "a"]));
    assert_eq!(item["id"], "a");
    assert_eq!(item["geometry"]["type"], "Point");

    command()
        .args(["parquet", "item", &href, "z"])
        .assert()
        .failure();
}

#[rstest]
fn generate_completions(mut command: Command) {
    command
        .arg("generate-completions")
        .arg("bash")
        .assert()
        .success();
}
