use std::io::Write;

use anyhow::{bail, Context, Result};
use ndarray::Array2;
use rusty_h5::{DatasetInfo, ElementType, Loader};
use serde::Serialize;

use crate::cli::{LoadAs, OutputFormat};

// ---------------------------------------------------------------------------
// Loaded values
// ---------------------------------------------------------------------------

/// One dataset after loading, ready for printing.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Values {
    Ints(Vec<i32>),
    Floats(Vec<f32>),
    Strings(Vec<String>),
    IntGrid(Vec<Vec<i32>>),
    FloatGrid(Vec<Vec<f32>>),
}

#[derive(Debug, Clone, Serialize)]
pub struct Loaded {
    pub name: String,
    pub values: Values,
}

fn rows<T: Clone>(grid: Array2<T>) -> Vec<Vec<T>> {
    grid.rows().into_iter().map(|r| r.to_vec()).collect()
}

/// Resolve `auto` into a concrete loader from the stored encoding and rank.
pub fn resolve(info: &DatasetInfo, requested: LoadAs) -> Result<LoadAs> {
    if requested != LoadAs::Auto {
        return Ok(requested);
    }
    let two_d = info.rank() == 2;
    match ElementType::natural(info.encoding) {
        Some(ElementType::Int32) if two_d => Ok(LoadAs::Int2d),
        Some(ElementType::Int32) => Ok(LoadAs::Int),
        Some(ElementType::Float32) if two_d => Ok(LoadAs::Float2d),
        Some(ElementType::Float32) => Ok(LoadAs::Float),
        Some(ElementType::String) => Ok(LoadAs::String),
        None => bail!(
            "dataset '{}' is stored as {}; no typed loader applies",
            info.name,
            info.encoding
        ),
    }
}

/// Load one dataset the way `load_as` asks for.
pub fn load(loader: &Loader, file: &std::path::Path, name: &str, load_as: LoadAs) -> Result<Loaded> {
    let load_as = match load_as {
        LoadAs::Auto => {
            let info = loader
                .inspect(file, name)
                .with_context(|| format!("inspecting dataset '{name}'"))?;
            resolve(&info, load_as)?
        }
        other => other,
    };
    log::info!("Loading {name} as {load_as:?}");

    let values = match load_as {
        LoadAs::Int => Values::Ints(loader.load_int(file, name)?),
        LoadAs::Float => Values::Floats(loader.load_float(file, name)?),
        LoadAs::String => Values::Strings(loader.load_strings(file, name)?),
        LoadAs::Int2d => Values::IntGrid(rows(loader.load_2d_int(file, name)?)),
        LoadAs::Float2d => Values::FloatGrid(rows(loader.load_2d_float(file, name)?)),
        LoadAs::Auto => bail!("no loader resolved for dataset '{name}'"),
    };
    Ok(Loaded {
        name: name.to_string(),
        values,
    })
}

/// Strip trailing NUL padding from every string.
pub fn trim_padding(loaded: &mut Loaded) {
    if let Values::Strings(strings) = &mut loaded.values {
        for s in strings.iter_mut() {
            let trimmed = s.trim_end_matches('\0').len();
            s.truncate(trimmed);
        }
    }
}

// ---------------------------------------------------------------------------
// Rendering
// ---------------------------------------------------------------------------

pub fn write_all(out: &mut impl Write, loaded: &[Loaded], format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Text => {
            for dataset in loaded {
                write_text(out, dataset)?;
            }
        }
        OutputFormat::Json => {
            serde_json::to_writer_pretty(&mut *out, loaded).context("writing JSON")?;
            writeln!(out)?;
        }
        OutputFormat::Csv => write_csv(out, loaded)?,
    }
    Ok(())
}

fn write_text(out: &mut impl Write, dataset: &Loaded) -> Result<()> {
    let name = &dataset.name;
    match &dataset.values {
        Values::Ints(v) => v.iter().try_for_each(|x| writeln!(out, "{name}: {x}"))?,
        Values::Floats(v) => v.iter().try_for_each(|x| writeln!(out, "{name}: {x}"))?,
        Values::Strings(v) => v
            .iter()
            .try_for_each(|x| writeln!(out, "{name}: {}", x.escape_debug()))?,
        Values::IntGrid(grid) => write_grid(out, name, grid)?,
        Values::FloatGrid(grid) => write_grid(out, name, grid)?,
    }
    Ok(())
}

fn write_grid<T: std::fmt::Display>(
    out: &mut impl Write,
    name: &str,
    grid: &[Vec<T>],
) -> std::io::Result<()> {
    for (i, row) in grid.iter().enumerate() {
        for (j, value) in row.iter().enumerate() {
            writeln!(out, "{name}: {i}, {j} = {value}")?;
        }
    }
    Ok(())
}

/// CSV layout: `dataset,row,col,value`, one line per element. 1-D datasets
/// use row 0.
fn write_csv(out: &mut impl Write, loaded: &[Loaded]) -> Result<()> {
    let mut writer = csv::Writer::from_writer(out);
    writer.write_record(["dataset", "row", "col", "value"])?;
    for dataset in loaded {
        let name = dataset.name.as_str();
        let cells: Vec<(usize, usize, String)> = match &dataset.values {
            Values::Ints(v) => flat_cells(v),
            Values::Floats(v) => flat_cells(v),
            Values::Strings(v) => flat_cells(v),
            Values::IntGrid(grid) => grid_cells(grid),
            Values::FloatGrid(grid) => grid_cells(grid),
        };
        for (i, j, value) in cells {
            writer.write_record([name, &i.to_string(), &j.to_string(), &value])?;
        }
    }
    writer.flush().context("flushing CSV")?;
    Ok(())
}

fn flat_cells<T: ToString>(values: &[T]) -> Vec<(usize, usize, String)> {
    values
        .iter()
        .enumerate()
        .map(|(j, v)| (0, j, v.to_string()))
        .collect()
}

fn grid_cells<T: ToString>(grid: &[Vec<T>]) -> Vec<(usize, usize, String)> {
    grid.iter()
        .enumerate()
        .flat_map(|(i, row)| {
            row.iter()
                .enumerate()
                .map(move |(j, v)| (i, j, v.to_string()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusty_h5::{ElementEncoding, Shape};

    fn info(dims: Vec<usize>, encoding: ElementEncoding) -> DatasetInfo {
        DatasetInfo {
            name: "d".to_string(),
            shape: Shape::new(dims),
            encoding,
        }
    }

    #[test]
    fn test_resolve_auto() {
        assert_eq!(
            resolve(&info(vec![3], ElementEncoding::Int64), LoadAs::Auto).unwrap(),
            LoadAs::Int
        );
        assert_eq!(
            resolve(&info(vec![2, 3], ElementEncoding::Float64), LoadAs::Auto).unwrap(),
            LoadAs::Float2d
        );
        assert_eq!(
            resolve(
                &info(vec![5], ElementEncoding::FixedString { width: 7 }),
                LoadAs::Auto
            )
            .unwrap(),
            LoadAs::String
        );
        assert!(resolve(&info(vec![5], ElementEncoding::Other { width: 2 }), LoadAs::Auto).is_err());
        assert_eq!(
            resolve(&info(vec![5], ElementEncoding::Int64), LoadAs::Float).unwrap(),
            LoadAs::Float
        );
    }

    #[test]
    fn test_text_output() {
        let loaded = vec![
            Loaded {
                name: "twoD".into(),
                values: Values::IntGrid(vec![vec![21, 22], vec![24, 25]]),
            },
            Loaded {
                name: "strings".into(),
                values: Values::Strings(vec!["ab\0".into()]),
            },
        ];
        let mut out = Vec::new();
        write_all(&mut out, &loaded, OutputFormat::Text).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(
            text,
            "twoD: 0, 0 = 21\ntwoD: 0, 1 = 22\ntwoD: 1, 0 = 24\ntwoD: 1, 1 = 25\nstrings: ab\\0\n"
        );
    }

    #[test]
    fn test_csv_output() {
        let loaded = vec![Loaded {
            name: "floats".into(),
            values: Values::Floats(vec![0.5, 1.5]),
        }];
        let mut out = Vec::new();
        write_all(&mut out, &loaded, OutputFormat::Csv).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(text, "dataset,row,col,value\nfloats,0,0,0.5\nfloats,0,1,1.5\n");
    }

    #[test]
    fn test_json_output() {
        let loaded = vec![Loaded {
            name: "integers".into(),
            values: Values::Ints(vec![1, 2]),
        }];
        let mut out = Vec::new();
        write_all(&mut out, &loaded, OutputFormat::Json).unwrap();
        let parsed: serde_json::Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(
            parsed,
            serde_json::json!([{ "name": "integers", "values": [1, 2] }])
        );
    }

    #[test]
    fn test_trim_padding() {
        let mut loaded = Loaded {
            name: "strings".into(),
            values: Values::Strings(vec!["str\0\0".into(), "string1".into()]),
        };
        trim_padding(&mut loaded);
        assert_eq!(
            loaded.values,
            Values::Strings(vec!["str".into(), "string1".into()])
        );
    }
}
