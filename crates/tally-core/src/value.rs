//! The bound every reported value type satisfies.

use std::fmt::Debug;

use crate::codec::Persist;

/// A type that can be stored in a registry.
///
/// Values are cloned when history rotates and when collectives ship them
/// between ranks, default-constructed when a record is first touched,
/// and persisted slot by slot on checkpoint.
///
/// [`real_values`](ReportValue::real_values) lets the registry flatten
/// every real value (`f64`, `f32` and vectors of them) into one vector
/// for output and diagnostics without knowing concrete types; the default
/// says "not real".
pub trait ReportValue: Clone + Default + Debug + Persist + Send + 'static {
    /// The numeric reading of the value, if it has one.
    fn real_values(&self) -> Option<RealValues> {
        None
    }
}

/// Numeric reading of a reported value.
#[derive(Clone, Debug, PartialEq)]
pub enum RealValues {
    /// A single real, reported under the value's own name.
    Scalar(f64),
    /// One real per element, reported as `<key>/<index>`.
    Vector(Vec<f64>),
}

impl RealValues {
    /// Number of reals.
    pub fn len(&self) -> usize {
        match self {
            Self::Scalar(_) => 1,
            Self::Vector(v) => v.len(),
        }
    }

    /// Whether there are no reals (an empty vector).
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Flatten into a vector.
    pub fn into_vec(self) -> Vec<f64> {
        match self {
            Self::Scalar(x) => vec![x],
            Self::Vector(v) => v,
        }
    }
}

macro_rules! report_value_real {
    ($($ty:ty),* $(,)?) => {
        $(
            impl ReportValue for $ty {
                fn real_values(&self) -> Option<RealValues> {
                    Some(RealValues::Scalar(f64::from(*self)))
                }
            }
        )*
    };
}

report_value_real!(f64, f32);

macro_rules! report_value_opaque {
    ($($ty:ty),* $(,)?) => {
        $(impl ReportValue for $ty {})*
    };
}

report_value_opaque!(i8, u8, i16, u16, i32, u32, i64, u64, usize, isize, bool, String);

/// A vector reports one real per element when its element type reports a
/// scalar; vectors of anything else are not numeric.
impl<T: ReportValue> ReportValue for Vec<T> {
    fn real_values(&self) -> Option<RealValues> {
        if !matches!(T::default().real_values(), Some(RealValues::Scalar(_))) {
            return None;
        }
        self.iter()
            .map(|x| match x.real_values()? {
                RealValues::Scalar(v) => Some(v),
                RealValues::Vector(_) => None,
            })
            .collect::<Option<Vec<f64>>>()
            .map(RealValues::Vector)
    }
}

impl<A: ReportValue, B: ReportValue> ReportValue for (A, B) {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalars_report_one_real() {
        assert_eq!(2.5f64.real_values(), Some(RealValues::Scalar(2.5)));
        assert_eq!(0.5f32.real_values(), Some(RealValues::Scalar(0.5)));
    }

    #[test]
    fn real_vectors_report_every_element() {
        let reals = vec![1.0, 2.0].real_values().unwrap();
        assert_eq!(reals.len(), 2);
        assert_eq!(reals.into_vec(), vec![1.0, 2.0]);
    }

    #[test]
    fn empty_real_vector_reports_no_elements() {
        assert_eq!(Vec::<f64>::new().real_values(), Some(RealValues::Vector(Vec::new())));
    }

    #[test]
    fn non_numeric_values_report_none() {
        assert_eq!(String::from("x").real_values(), None);
        assert_eq!(vec![String::new()].real_values(), None);
        assert_eq!(vec![vec![1.0f64]].real_values(), None);
        assert_eq!(true.real_values(), None);
        assert_eq!(3i32.real_values(), None);
        assert_eq!(vec![1u64, 2].real_values(), None);
    }
}
