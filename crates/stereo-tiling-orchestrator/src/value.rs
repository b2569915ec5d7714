//! Values flowing between tasks.

use std::collections::BTreeMap;

use serde_json::{Map, Value};

use crate::{Deferred, DumpedHandle, OrchestratorError};

/// Array-like tile: named `f64` bands over a `rows × cols` window, row-major.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DenseTile {
    rows: usize,
    cols: usize,
    bands: BTreeMap<String, Vec<f64>>,
    pub attributes: Map<String, Value>,
}

impl DenseTile {
    pub fn new(rows: usize, cols: usize) -> Self {
        Self {
            rows,
            cols,
            ..Self::default()
        }
    }

    #[inline]
    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    /// Add or replace a band; `values.len()` must be `rows * cols`.
    pub fn insert_band(
        &mut self,
        name: impl Into<String>,
        values: Vec<f64>,
    ) -> Result<(), OrchestratorError> {
        let name = name.into();
        let expected = self.rows * self.cols;
        if values.len() != expected {
            return Err(OrchestratorError::Shape {
                kind: "band",
                name,
                expected,
                got: values.len(),
            });
        }
        self.bands.insert(name, values);
        Ok(())
    }

    pub fn with_band(
        mut self,
        name: impl Into<String>,
        values: Vec<f64>,
    ) -> Result<Self, OrchestratorError> {
        self.insert_band(name, values)?;
        Ok(self)
    }

    pub fn band(&self, name: &str) -> Option<&[f64]> {
        self.bands.get(name).map(Vec::as_slice)
    }

    /// Bands in name order.
    pub fn bands(&self) -> impl Iterator<Item = (&str, &[f64])> + '_ {
        self.bands.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    #[inline]
    pub fn num_bands(&self) -> usize {
        self.bands.len()
    }
}

/// Point-like tile: named `f64` columns of equal length.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SparseTile {
    len: usize,
    columns: BTreeMap<String, Vec<f64>>,
    pub attributes: Map<String, Value>,
}

impl SparseTile {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a column. The first column fixes the number of points.
    pub fn insert_column(
        &mut self,
        name: impl Into<String>,
        values: Vec<f64>,
    ) -> Result<(), OrchestratorError> {
        let name = name.into();
        let replacing_only = self.columns.len() == 1 && self.columns.contains_key(&name);
        if !self.columns.is_empty() && !replacing_only && values.len() != self.len {
            return Err(OrchestratorError::Shape {
                kind: "column",
                name,
                expected: self.len,
                got: values.len(),
            });
        }
        self.len = values.len();
        self.columns.insert(name, values);
        Ok(())
    }

    pub fn with_column(
        mut self,
        name: impl Into<String>,
        values: Vec<f64>,
    ) -> Result<Self, OrchestratorError> {
        self.insert_column(name, values)?;
        Ok(self)
    }

    pub fn column(&self, name: &str) -> Option<&[f64]> {
        self.columns.get(name).map(Vec::as_slice)
    }

    /// Columns in name order.
    pub fn columns(&self) -> impl Iterator<Item = (&str, &[f64])> + '_ {
        self.columns.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    /// Number of points.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

/// Argument or result of a task.
#[derive(Clone, Debug, Default)]
pub enum TaskValue {
    /// No tile; preserved as-is across the disk wrapper.
    #[default]
    None,
    Dense(DenseTile),
    Sparse(SparseTile),
    /// Tile persisted by the disk wrapper.
    Handle(DumpedHandle),
    /// Plain JSON metadata (windows, profiles, tile indices).
    Meta(Value),
    List(Vec<TaskValue>),
    /// Output of another task, resolved before the body runs.
    Deferred(Deferred),
}

impl TaskValue {
    pub fn kind_name(&self) -> &'static str {
        match self {
            TaskValue::None => "none",
            TaskValue::Dense(_) => "dense",
            TaskValue::Sparse(_) => "sparse",
            TaskValue::Handle(_) => "handle",
            TaskValue::Meta(_) => "meta",
            TaskValue::List(_) => "list",
            TaskValue::Deferred(_) => "deferred",
        }
    }

    #[inline]
    pub fn is_none(&self) -> bool {
        matches!(self, TaskValue::None)
    }

    pub fn as_dense(&self) -> Option<&DenseTile> {
        match self {
            TaskValue::Dense(t) => Some(t),
            _ => None,
        }
    }

    pub fn as_sparse(&self) -> Option<&SparseTile> {
        match self {
            TaskValue::Sparse(t) => Some(t),
            _ => None,
        }
    }

    pub fn as_handle(&self) -> Option<&DumpedHandle> {
        match self {
            TaskValue::Handle(h) => Some(h),
            _ => None,
        }
    }

    pub fn as_meta(&self) -> Option<&Value> {
        match self {
            TaskValue::Meta(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[TaskValue]> {
        match self {
            TaskValue::List(v) => Some(v),
            _ => None,
        }
    }

    /// Rebuild the value bottom-up, applying `f` to every non-list leaf.
    pub fn try_map_leaves<F>(self, f: &mut F) -> Result<TaskValue, OrchestratorError>
    where
        F: FnMut(TaskValue) -> Result<TaskValue, OrchestratorError>,
    {
        match self {
            TaskValue::List(items) => Ok(TaskValue::List(
                items
                    .into_iter()
                    .map(|v| v.try_map_leaves(f))
                    .collect::<Result<_, _>>()?,
            )),
            leaf => f(leaf),
        }
    }
}

impl From<DenseTile> for TaskValue {
    fn from(t: DenseTile) -> Self {
        TaskValue::Dense(t)
    }
}

impl From<SparseTile> for TaskValue {
    fn from(t: SparseTile) -> Self {
        TaskValue::Sparse(t)
    }
}

impl From<Deferred> for TaskValue {
    fn from(d: Deferred) -> Self {
        TaskValue::Deferred(d)
    }
}

impl From<Vec<TaskValue>> for TaskValue {
    fn from(v: Vec<TaskValue>) -> Self {
        TaskValue::List(v)
    }
}

impl From<Value> for TaskValue {
    fn from(v: Value) -> Self {
        TaskValue::Meta(v)
    }
}

/// Positional and named task arguments.
#[derive(Clone, Debug, Default)]
pub struct TaskArgs {
    pub positional: Vec<TaskValue>,
    pub named: BTreeMap<String, TaskValue>,
}

impl TaskArgs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a positional argument.
    pub fn arg(mut self, value: impl Into<TaskValue>) -> Self {
        self.positional.push(value.into());
        self
    }

    /// Set a named argument.
    pub fn named(mut self, name: impl Into<String>, value: impl Into<TaskValue>) -> Self {
        self.named.insert(name.into(), value.into());
        self
    }

    pub fn get(&self, index: usize) -> Result<&TaskValue, OrchestratorError> {
        self.positional
            .get(index)
            .ok_or_else(|| OrchestratorError::MissingArgument(format!("#{index}")))
    }

    pub fn get_named(&self, name: &str) -> Result<&TaskValue, OrchestratorError> {
        self.named
            .get(name)
            .ok_or_else(|| OrchestratorError::MissingArgument(name.to_string()))
    }

    /// Move a positional argument out, leaving `None` in its place.
    pub fn take(&mut self, index: usize) -> Result<TaskValue, OrchestratorError> {
        self.positional
            .get_mut(index)
            .map(std::mem::take)
            .ok_or_else(|| OrchestratorError::MissingArgument(format!("#{index}")))
    }

    /// Apply `f` to every leaf of every argument, lists included.
    pub fn try_map_leaves<F>(self, mut f: F) -> Result<TaskArgs, OrchestratorError>
    where
        F: FnMut(TaskValue) -> Result<TaskValue, OrchestratorError>,
    {
        let positional = self
            .positional
            .into_iter()
            .map(|v| v.try_map_leaves(&mut f))
            .collect::<Result<_, _>>()?;
        let named = self
            .named
            .into_iter()
            .map(|(k, v)| Ok((k, v.try_map_leaves(&mut f)?)))
            .collect::<Result<_, OrchestratorError>>()?;
        Ok(TaskArgs { positional, named })
    }
}
