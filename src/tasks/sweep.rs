use crate::tasks::naming::{ParamValue, ParameterMap};

/// One dial of a sweep and the values it takes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Axis {
    pub key: String,
    pub values: Vec<ParamValue>,
}

impl Axis {
    pub fn new<V: Into<ParamValue>>(key: &str, values: impl IntoIterator<Item = V>) -> Self {
        Axis {
            key: key.to_string(),
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    pub fn fixed(key: &str, value: impl Into<ParamValue>) -> Self {
        Axis {
            key: key.to_string(),
            values: vec![value.into()],
        }
    }
}

/// Nested-loop enumeration of parameter assignments. The first axis is the
/// outermost loop.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Sweep {
    axes: Vec<Axis>,
}

impl Sweep {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn axis(mut self, axis: Axis) -> Self {
        self.axes.push(axis);
        self
    }

    pub fn axes(&self) -> &[Axis] {
        &self.axes
    }

    /// Number of points, without materialising them.
    pub fn len(&self) -> usize {
        self.axes.iter().map(|axis| axis.values.len()).product()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Every assignment of the Cartesian product, keys in axis order.
    pub fn points(&self) -> Vec<ParameterMap> {
        let mut points = vec![ParameterMap::new()];
        for axis in &self.axes {
            points = points
                .into_iter()
                .flat_map(|point| {
                    axis.values
                        .iter()
                        .map(move |value| point.clone().with(axis.key.as_str(), value.clone()))
                })
                .collect();
        }

        points
    }
}
