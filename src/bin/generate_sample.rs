use std::path::Path;

use ndarray::{array, Array2};
use rusty_h5::container::SnapshotBuilder;

const STRINGS: [&str; 5] = ["string1", "string2", "string3", "string4", "string5"];

fn integers() -> Vec<i64> {
    (0..10).collect()
}

fn floats() -> Vec<f64> {
    (0..10).map(|i| i as f64 / 10.0).collect()
}

fn two_d() -> Array2<i64> {
    array![[21, 22, 23], [24, 25, 26]]
}

fn write_snapshot(path: &Path) {
    let snapshot = SnapshotBuilder::new()
        .int64("integers", &integers())
        .float64("floats", &floats())
        .strings("strings", &STRINGS)
        .int64_2d("twoD", &two_d())
        .build();
    snapshot.write(path).expect("Failed to write snapshot");
}

#[cfg(feature = "hdf5")]
fn write_hdf5(path: &Path) {
    use hdf5::types::FixedAscii;

    let file = hdf5::File::create(path).expect("Failed to create HDF5 file");
    file.new_dataset_builder()
        .with_data(&integers()[..])
        .create("integers")
        .expect("Failed to write integers");
    file.new_dataset_builder()
        .with_data(&floats()[..])
        .create("floats")
        .expect("Failed to write floats");

    let strings: Vec<FixedAscii<7>> = STRINGS
        .iter()
        .map(|s| FixedAscii::from_ascii(s.as_bytes()).expect("Sample strings are ASCII"))
        .collect();
    file.new_dataset_builder()
        .with_data(&strings[..])
        .create("strings")
        .expect("Failed to write strings");
    file.new_dataset_builder()
        .with_data(&two_d())
        .create("twoD")
        .expect("Failed to write twoD");
}

fn main() {
    let output_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "testfile.json".to_string());
    let path = Path::new(&output_path);

    let is_hdf5 = matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("h5" | "hdf5")
    );

    if is_hdf5 {
        #[cfg(feature = "hdf5")]
        write_hdf5(path);
        #[cfg(not(feature = "hdf5"))]
        {
            eprintln!("Writing {output_path} needs the `hdf5` feature; use a .json path instead");
            std::process::exit(2);
        }
    } else {
        write_snapshot(path);
    }

    println!(
        "Wrote integers ({}), floats ({}), strings ({}) and twoD {:?} to {output_path}",
        integers().len(),
        floats().len(),
        STRINGS.len(),
        two_d().shape()
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    fn check_sample(path: &Path) {
        assert_eq!(
            rusty_h5::list_datasets(path).unwrap(),
            vec!["floats", "integers", "strings", "twoD"]
        );
        assert_eq!(
            rusty_h5::load_int_dataset(path, "integers").unwrap(),
            (0..10).collect::<Vec<i32>>()
        );
        assert_eq!(rusty_h5::load_float_dataset(path, "floats").unwrap().len(), 10);
        assert_eq!(
            rusty_h5::load_string_dataset(path, "strings").unwrap(),
            STRINGS.to_vec()
        );
        assert_eq!(
            rusty_h5::load_2d_int_dataset(path, "twoD").unwrap(),
            array![[21, 22, 23], [24, 25, 26]]
        );
    }

    #[test]
    fn test_snapshot_sample_reads_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("testfile.json");
        write_snapshot(&path);
        check_sample(&path);
    }

    #[cfg(feature = "hdf5")]
    #[test]
    fn test_hdf5_sample_reads_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("testfile.h5");
        write_hdf5(&path);
        check_sample(&path);
    }
}
