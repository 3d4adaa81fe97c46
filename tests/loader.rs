use std::path::{Path, PathBuf};

use ndarray::array;
use rusty_h5::container::SnapshotBuilder;
use rusty_h5::{
    inspect_dataset, list_datasets, load_2d_float_dataset, load_2d_int_dataset,
    load_float_dataset, load_int_dataset, load_raw_dataset, load_raw_dataset_unchecked,
    load_string_dataset, ElementEncoding, LoadError, LoadOptions, Loader,
};
use tempfile::TempDir;

fn sample_file(dir: &TempDir) -> PathBuf {
    let path = dir.path().join("testfile.json");
    SnapshotBuilder::new()
        .int64("integers", &(0..10).collect::<Vec<i64>>())
        .float64("floats", &[0.0, 0.1, 0.2])
        .strings_with_width("strings", 7, &["string1", "string2", "str"])
        .int64_2d("twoD", &array![[1i64, 2], [3, 4]])
        .build()
        .write(&path)
        .unwrap();
    path
}

fn write_json(dir: &TempDir, file_name: &str, json: &str) -> PathBuf {
    let path = dir.path().join(file_name);
    std::fs::write(&path, json).unwrap();
    path
}

#[test]
fn test_load_int_dataset() {
    let dir = TempDir::new().unwrap();
    let path = write_json(
        &dir,
        "ints.json",
        r#"{"datasets": {"ints": {"shape": [3], "data": {"encoding": "int64", "values": [1, 2, 3]}}}}"#,
    );
    assert_eq!(load_int_dataset(&path, "ints").unwrap(), vec![1, 2, 3]);
}

#[test]
fn test_load_sample_file() {
    let dir = TempDir::new().unwrap();
    let path = sample_file(&dir);

    assert_eq!(
        load_int_dataset(&path, "integers").unwrap(),
        (0..10).collect::<Vec<i32>>()
    );
    assert_eq!(
        load_float_dataset(&path, "floats").unwrap(),
        vec![0.0f32, 0.1, 0.2]
    );
    assert_eq!(
        load_2d_int_dataset(&path, "twoD").unwrap(),
        array![[1, 2], [3, 4]]
    );
}

#[test]
fn test_int_matrix_loads_as_floats() {
    let dir = TempDir::new().unwrap();
    let path = sample_file(&dir);
    assert_eq!(
        load_2d_float_dataset(&path, "twoD").unwrap(),
        array![[1.0f32, 2.0], [3.0, 4.0]]
    );
}

#[test]
fn test_strings_keep_padding() {
    let dir = TempDir::new().unwrap();
    let path = sample_file(&dir);

    let strings = load_string_dataset(&path, "strings").unwrap();
    assert_eq!(strings.len(), 3);
    assert!(strings.iter().all(|s| s.len() == 7));
    assert_eq!(strings.concat(), "string1string2str\0\0\0\0");
}

#[test]
fn test_missing_file() {
    let dir = TempDir::new().unwrap();
    let missing = dir.path().join("missing.json");

    let err = load_int_dataset(&missing, "integers").unwrap_err();
    assert!(err.is_file_not_found(), "got {err:?}");

    let err = load_raw_dataset::<i64>(&missing, "integers").unwrap_err();
    assert!(err.is_file_not_found(), "got {err:?}");
}

#[test]
fn test_missing_dataset() {
    let dir = TempDir::new().unwrap();
    let path = sample_file(&dir);
    match load_float_dataset(&path, "nope") {
        Err(LoadError::DatasetNotFound { name, .. }) => assert_eq!(name, "nope"),
        other => panic!("expected DatasetNotFound, got {other:?}"),
    }
}

#[test]
fn test_unknown_format() {
    let dir = TempDir::new().unwrap();
    let path = write_json(&dir, "data.bin", "not a container");
    assert!(matches!(
        load_int_dataset(&path, "integers"),
        Err(LoadError::UnsupportedFormat { .. })
    ));
}

#[test]
fn test_repeated_loads_are_identical() {
    let dir = TempDir::new().unwrap();
    let path = sample_file(&dir);
    let first = load_2d_int_dataset(&path, "twoD").unwrap();
    for _ in 0..3 {
        assert_eq!(load_2d_int_dataset(&path, "twoD").unwrap(), first);
    }
}

#[test]
fn test_rewritten_file_is_reread() {
    let dir = TempDir::new().unwrap();
    let path = sample_file(&dir);
    assert_eq!(load_int_dataset(&path, "integers").unwrap().len(), 10);

    SnapshotBuilder::new()
        .int64("integers", &[42])
        .build()
        .write(&path)
        .unwrap();
    assert_eq!(load_int_dataset(&path, "integers").unwrap(), vec![42]);
}

#[test]
fn test_raw_loader() {
    let dir = TempDir::new().unwrap();
    let path = sample_file(&dir);

    assert_eq!(
        load_raw_dataset::<i64>(&path, "integers").unwrap(),
        (0..10).collect::<Vec<i64>>()
    );
    assert!(matches!(
        load_raw_dataset::<u32>(&path, "integers"),
        Err(LoadError::WidthMismatch {
            stored: 8,
            requested: 4,
            ..
        })
    ));

    let halves = load_raw_dataset_unchecked::<u32>(&path, "integers").unwrap();
    assert_eq!(halves.len(), 20);
    assert_eq!(halves[2] + halves[3], 1);

    let err = load_raw_dataset_unchecked::<u32>(dir.path().join("missing.json"), "integers")
        .unwrap_err();
    assert!(err.is_file_not_found(), "got {err:?}");
}

#[test]
fn test_shapeless_dataset_policy() {
    let dir = TempDir::new().unwrap();
    let path = write_json(
        &dir,
        "shapeless.json",
        r#"{"datasets": {"d": {"data": {"encoding": "int64", "values": [1, 2]}}}}"#,
    );

    assert!(Loader::new().load_int(&path, "d").unwrap().is_empty());
    assert!(matches!(
        Loader::new()
            .with_options(LoadOptions::strict())
            .load_int(&path, "d"),
        Err(LoadError::ShapeQueryFailed { .. })
    ));
}

#[test]
fn test_inspect_and_list() {
    let dir = TempDir::new().unwrap();
    let path = sample_file(&dir);

    assert_eq!(
        list_datasets(&path).unwrap(),
        vec!["floats", "integers", "strings", "twoD"]
    );
    let info = inspect_dataset(&path, "twoD").unwrap();
    assert_eq!(info.shape.dims(), &[2, 2]);
    assert_eq!(info.rank(), 2);
    assert_eq!(info.encoding, ElementEncoding::Int64);

    let strings = inspect_dataset(&path, "strings").unwrap();
    assert_eq!(strings.encoding, ElementEncoding::FixedString { width: 7 });

    assert!(matches!(
        inspect_dataset(&path, "nope"),
        Err(LoadError::DatasetNotFound { .. })
    ));
    assert!(list_datasets(dir.path().join("missing.json"))
        .unwrap_err()
        .is_file_not_found());
}

#[test]
fn test_overflowing_shape_is_an_error() {
    let dir = TempDir::new().unwrap();
    let path = write_json(
        &dir,
        "huge.json",
        r#"{"datasets": {
            "ints": {"shape": [2305843009213693952], "data": {"encoding": "int64", "values": []}},
            "grid": {"shape": [4294967296, 4294967296], "data": {"encoding": "int64", "values": []}}
        }}"#,
    );

    assert!(matches!(
        load_int_dataset(&path, "ints"),
        Err(LoadError::ShapeOverflow { .. })
    ));
    assert!(matches!(
        load_raw_dataset::<i64>(&path, "ints"),
        Err(LoadError::ShapeOverflow { .. })
    ));
    assert!(matches!(
        load_2d_float_dataset(&path, "grid"),
        Err(LoadError::ShapeOverflow { .. })
    ));
}

#[test]
fn test_concurrent_loads() {
    let dir = TempDir::new().unwrap();
    let path = sample_file(&dir);
    let path: &Path = &path;

    std::thread::scope(|scope| {
        let handles: Vec<_> = (0..4)
            .map(|_| scope.spawn(move || load_int_dataset(path, "integers").unwrap()))
            .collect();
        for handle in handles {
            assert_eq!(handle.join().unwrap().len(), 10);
        }
    });
}
