//! CSV loading into numeric matrices and prediction output

use crate::error::{Result, TrainerError};
use ndarray::{Array1, Array2};
use polars::prelude::*;
use std::fs::File;
use std::path::{Path, PathBuf};

/// Load a CSV with a header row into a frame
pub fn load_csv(path: impl AsRef<Path>) -> Result<DataFrame> {
    let path = path.as_ref();
    let df = CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(Some(100))
        .try_into_reader_with_file_path(Some(PathBuf::from(path)))?
        .finish()?;
    Ok(df)
}

/// Convert every column of `df` to `f64` and lay it out row-major.
///
/// Missing or non-numeric cells are a `DataError` naming the column.
pub fn frame_to_array2(df: &DataFrame) -> Result<Array2<f64>> {
    let n_rows = df.height();

    let col_data: Vec<Vec<f64>> = df
        .get_columns()
        .iter()
        .map(|column| {
            let name = column.name().to_string();
            let as_f64 = column
                .cast(&DataType::Float64)
                .map_err(|e| TrainerError::DataError(format!("column '{}': {}", name, e)))?;
            as_f64
                .f64()
                .map_err(|e| TrainerError::DataError(format!("column '{}': {}", name, e)))?
                .into_iter()
                .enumerate()
                .map(|(row, v)| {
                    v.ok_or_else(|| {
                        TrainerError::DataError(format!(
                            "column '{}' has a missing or non-numeric value at row {}",
                            name, row
                        ))
                    })
                })
                .collect::<Result<Vec<f64>>>()
        })
        .collect::<Result<Vec<Vec<f64>>>>()?;

    let col_refs: Vec<&[f64]> = col_data.iter().map(|c| c.as_slice()).collect();
    Ok(Array2::from_shape_fn((n_rows, col_refs.len()), |(r, c)| col_refs[c][r]))
}

/// Load a headered numeric CSV as a matrix (rows are samples)
pub fn load_matrix_csv(path: impl AsRef<Path>) -> Result<Array2<f64>> {
    let df = load_csv(path)?;
    frame_to_array2(&df)
}

/// Write predictions as a single `prediction` column
pub fn write_predictions_csv(predictions: &Array1<f64>, path: impl AsRef<Path>) -> Result<()> {
    let mut df = DataFrame::new(vec![Column::new(
        "prediction".into(),
        predictions.to_vec(),
    )])?;

    let mut file = File::create(path.as_ref())?;
    CsvWriter::new(&mut file).finish(&mut df)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_load_matrix_csv() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("train.csv");
        std::fs::write(&path, "a,b,target\n1,2.5,3\n4,5,6.5\n").unwrap();

        let m = load_matrix_csv(&path).unwrap();
        assert_eq!(m, array![[1.0, 2.5, 3.0], [4.0, 5.0, 6.5]]);
    }

    #[test]
    fn test_missing_value_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gaps.csv");
        std::fs::write(&path, "a,target\n1,2\n,4\n").unwrap();

        assert!(matches!(load_matrix_csv(&path), Err(TrainerError::DataError(_))));
    }

    #[test]
    fn test_write_predictions_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pred.csv");
        write_predictions_csv(&array![1.5, 2.0, -3.25], &path).unwrap();

        let df = load_csv(&path).unwrap();
        assert_eq!(df.width(), 1);
        assert_eq!(df.get_column_names()[0].as_str(), "prediction");
        assert_eq!(frame_to_array2(&df).unwrap().column(0).to_vec(), vec![1.5, 2.0, -3.25]);
    }

    #[test]
    fn test_missing_file() {
        assert!(load_matrix_csv("/nonexistent/definitely/missing.csv").is_err());
    }
}
