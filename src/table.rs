use polars::prelude::*;
use serde::Serialize;

use crate::errors::TableError;

/// What counts as a missing cell when rows are dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Missing {
    /// Only true nulls; a NaN float is a value.
    Null,
    /// Nulls plus NaN in float columns.
    NullOrNan,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Describe {
    pub count: usize,
    pub null_count: usize,
    pub mean: f64,
    pub std: f64,
    pub min: f64,
    pub q25: f64,
    pub median: f64,
    pub q75: f64,
    pub max: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NullCount {
    pub column: String,
    pub nulls: usize,
}

pub fn is_numeric(dtype: &DataType) -> bool {
    matches!(
        dtype,
        DataType::Int8
            | DataType::Int16
            | DataType::Int32
            | DataType::Int64
            | DataType::UInt8
            | DataType::UInt16
            | DataType::UInt32
            | DataType::UInt64
            | DataType::Float32
            | DataType::Float64
    )
}

fn is_float(dtype: &DataType) -> bool {
    matches!(dtype, DataType::Float32 | DataType::Float64)
}

/// A loaded dataset. Thin wrapper over a polars `DataFrame` exposing the
/// handful of frame operations the checks, coverage and feature code need.
#[derive(Debug, Clone, Default)]
pub struct Table {
    df: DataFrame,
}

impl PartialEq for Table {
    fn eq(&self, other: &Self) -> bool {
        self.df.equals_missing(&other.df)
    }
}

impl From<DataFrame> for Table {
    fn from(df: DataFrame) -> Self {
        Self { df }
    }
}

impl Table {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_columns(columns: Vec<Column>) -> Result<Self, TableError> {
        Ok(Self {
            df: DataFrame::new(columns)?,
        })
    }

    pub fn frame(&self) -> &DataFrame {
        &self.df
    }

    pub fn into_frame(self) -> DataFrame {
        self.df
    }

    pub fn with_column(mut self, column: impl Into<Column>) -> Result<Self, TableError> {
        self.push_column(column)?;
        Ok(self)
    }

    /// Adds a column, replacing an existing one with the same name.
    pub fn push_column(&mut self, column: impl Into<Column>) -> Result<(), TableError> {
        self.df.with_column(column.into())?;
        Ok(())
    }

    /// Evaluates `exprs` against the table and adds (or replaces) their outputs.
    pub fn with_exprs(&mut self, exprs: Vec<Expr>) -> Result<(), TableError> {
        self.df = self.df.clone().lazy().with_columns(exprs).collect()?;
        Ok(())
    }

    pub fn height(&self) -> usize {
        self.df.height()
    }

    pub fn width(&self) -> usize {
        self.df.width()
    }

    pub fn shape(&self) -> (usize, usize) {
        self.df.shape()
    }

    pub fn column_names(&self) -> Vec<String> {
        self.df
            .get_columns()
            .iter()
            .map(|c| c.name().to_string())
            .collect()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.df.column(name).is_ok()
    }

    pub fn require(&self, name: &str) -> Result<&Column, TableError> {
        self.df
            .column(name)
            .map_err(|_| TableError::MissingColumn(name.to_string()))
    }

    pub fn dtype(&self, name: &str) -> Option<DataType> {
        self.df.column(name).ok().map(|c| c.dtype().clone())
    }

    pub fn filter(&self, predicate: Expr) -> Result<Table, TableError> {
        Ok(self.df.clone().lazy().filter(predicate).collect()?.into())
    }

    pub fn head(&self, n: usize) -> Table {
        self.df.head(Some(n)).into()
    }

    pub fn null_count(&self, name: &str) -> Result<usize, TableError> {
        Ok(self.require(name)?.null_count())
    }

    /// Null counts for the named columns that exist, most nulls first.
    /// Ties keep the order of `names`.
    pub fn null_counts<S: AsRef<str>>(&self, names: &[S]) -> Vec<NullCount> {
        let mut out: Vec<NullCount> = names
            .iter()
            .filter_map(|name| {
                let name = name.as_ref();
                self.df.column(name).ok().map(|c| NullCount {
                    column: name.to_string(),
                    nulls: c.null_count(),
                })
            })
            .collect();
        out.sort_by(|a, b| b.nulls.cmp(&a.nulls));
        out
    }

    /// Keeps rows with a value in every column of `names`; returns them
    /// with the number of rows dropped.
    pub fn drop_nulls<S: AsRef<str>>(
        &self,
        names: &[S],
        missing: Missing,
    ) -> Result<(Table, usize), TableError> {
        let mut keep = lit(true);
        for name in names {
            let name = name.as_ref();
            let column = self.require(name)?;
            let mut present = col(name).is_not_null();
            if missing == Missing::NullOrNan && is_float(column.dtype()) {
                present = present.and(col(name).is_not_nan());
            }
            keep = keep.and(present);
        }
        let kept = self.filter(keep)?;
        let dropped = self.height() - kept.height();
        Ok((kept, dropped))
    }

    /// Number of distinct value combinations across `names`; null is a value.
    pub fn distinct_count<S: AsRef<str>>(&self, names: &[S]) -> Result<usize, TableError> {
        let keys: Vec<Expr> = names
            .iter()
            .map(|name| {
                self.require(name.as_ref())?;
                Ok(col(name.as_ref()))
            })
            .collect::<Result<_, TableError>>()?;
        let groups = self
            .df
            .clone()
            .lazy()
            .group_by(keys)
            .agg([len()])
            .collect()?;
        Ok(groups.height())
    }

    /// One row per distinct `keys` combination, in first-appearance order.
    pub fn group_agg(&self, keys: &[&str], aggs: Vec<Expr>) -> Result<Table, TableError> {
        for key in keys {
            self.require(key)?;
        }
        let by: Vec<Expr> = keys.iter().map(|k| col(*k)).collect();
        Ok(self
            .df
            .clone()
            .lazy()
            .group_by_stable(by)
            .agg(aggs)
            .collect()?
            .into())
    }

    /// Distinct values of an integer column with their row counts, by value.
    pub fn value_counts(&self, name: &str) -> Result<Vec<(Option<i64>, usize)>, TableError> {
        let counts = self.group_agg(&[name], vec![len().alias("count")])?;
        let values = counts.i64_values(name)?;
        let rows = counts.i64_values("count")?;
        let mut out: Vec<(Option<i64>, usize)> = values
            .into_iter()
            .zip(rows)
            .map(|(v, n)| (v, n.unwrap_or(0) as usize))
            .collect();
        out.sort_by_key(|(v, _)| *v);
        Ok(out)
    }

    /// count/mean/std/min/quartiles/max of a numeric or boolean column.
    /// Quartiles use nearest-rank interpolation.
    pub fn describe(&self, name: &str) -> Result<Describe, TableError> {
        self.numeric(name)?;
        let x = || col(name).cast(DataType::Float64);
        let stats = self
            .df
            .clone()
            .lazy()
            .select([
                x().count().cast(DataType::Float64).alias("count"),
                x().null_count().cast(DataType::Float64).alias("null_count"),
                x().mean().alias("mean"),
                x().std(1).alias("std"),
                x().min().alias("min"),
                x().quantile(lit(0.25), QuantileMethod::Nearest).alias("q25"),
                x().quantile(lit(0.5), QuantileMethod::Nearest).alias("median"),
                x().quantile(lit(0.75), QuantileMethod::Nearest).alias("q75"),
                x().max().alias("max"),
            ])
            .collect()?;
        let stats = Table::from(stats);
        let scalar = |field: &str| -> Result<f64, TableError> {
            Ok(stats
                .f64_values(field)?
                .first()
                .copied()
                .flatten()
                .unwrap_or(f64::NAN))
        };
        Ok(Describe {
            count: scalar("count")? as usize,
            null_count: scalar("null_count")? as usize,
            mean: scalar("mean")?,
            std: scalar("std")?,
            min: scalar("min")?,
            q25: scalar("q25")?,
            median: scalar("median")?,
            q75: scalar("q75")?,
            max: scalar("max")?,
        })
    }

    /// Column values as floats; booleans become 0/1.
    pub fn f64_values(&self, name: &str) -> Result<Vec<Option<f64>>, TableError> {
        let column = self.numeric(name)?.cast(&DataType::Float64)?;
        Ok(column
            .as_materialized_series()
            .f64()?
            .into_iter()
            .collect())
    }

    pub fn i64_values(&self, name: &str) -> Result<Vec<Option<i64>>, TableError> {
        let column = self.numeric(name)?.cast(&DataType::Int64)?;
        Ok(column
            .as_materialized_series()
            .i64()?
            .into_iter()
            .collect())
    }

    /// Column values rendered as strings; works for any dtype.
    pub fn str_values(&self, name: &str) -> Result<Vec<Option<String>>, TableError> {
        let column = self.require(name)?.cast(&DataType::String)?;
        Ok(column
            .as_materialized_series()
            .str()?
            .into_iter()
            .map(|v| v.map(str::to_string))
            .collect())
    }

    fn numeric(&self, name: &str) -> Result<&Column, TableError> {
        let column = self.require(name)?;
        let dtype = column.dtype();
        if is_numeric(dtype) || matches!(dtype, DataType::Boolean | DataType::Null) {
            Ok(column)
        } else {
            Err(TableError::WrongType {
                name: name.to_string(),
                expected: "numeric or bool",
                actual: dtype.to_string(),
            })
        }
    }
}
