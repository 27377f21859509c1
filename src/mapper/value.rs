use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, Utc};
use uuid::Uuid;
use crate::core::types::{Number, ValueType};

/// A projected field value before it is turned into backend fields.
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    Str(String),
    Number(Number),
}

impl Scalar {
    pub fn into_string(self) -> String {
        match self {
            Scalar::Str(s) => s,
            Scalar::Number(n) => n.to_string(),
        }
    }
}

/// Bounds of a range field, both inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexRange<V> {
    pub min: V,
    pub max: V,
}

impl<V> IndexRange<V> {
    pub fn new(min: V, max: V) -> Self {
        IndexRange { min, max }
    }
}

/// A value that can be projected into an indexed or sorted field.
///
/// Temporal values become epoch numbers: days for dates, milliseconds for
/// UTC instants, seconds for offset and local date-times. Local date-times
/// are read at the mapper's zone offset.
pub trait IndexValue {
    fn value_type() -> ValueType
    where
        Self: Sized;

    fn to_scalar(&self, zone: &FixedOffset) -> Scalar;
}

macro_rules! string_value {
    ($($ty:ty),*) => {
        $(
            impl IndexValue for $ty {
                fn value_type() -> ValueType {
                    ValueType::String
                }

                fn to_scalar(&self, _zone: &FixedOffset) -> Scalar {
                    Scalar::Str(self.to_string())
                }
            }
        )*
    };
}

string_value!(String, &'static str, bool, char, Uuid);

macro_rules! number_value {
    ($($ty:ty => $value_type:ident, $variant:ident as $cast:ty),*) => {
        $(
            impl IndexValue for $ty {
                fn value_type() -> ValueType {
                    ValueType::$value_type
                }

                fn to_scalar(&self, _zone: &FixedOffset) -> Scalar {
                    Scalar::Number(Number::$variant(*self as $cast))
                }
            }
        )*
    };
}

number_value!(
    i32 => Integer, Int as i32,
    i64 => Long, Long as i64,
    u32 => Long, Long as i64,
    f32 => Float, Float as f32,
    f64 => Double, Double as f64
);

impl IndexValue for NaiveDate {
    fn value_type() -> ValueType {
        ValueType::Long
    }

    fn to_scalar(&self, _zone: &FixedOffset) -> Scalar {
        let days = self.signed_duration_since(NaiveDate::default()).num_days();
        Scalar::Number(Number::Long(days))
    }
}

impl IndexValue for DateTime<Utc> {
    fn value_type() -> ValueType {
        ValueType::Long
    }

    fn to_scalar(&self, _zone: &FixedOffset) -> Scalar {
        Scalar::Number(Number::Long(self.timestamp_millis()))
    }
}

impl IndexValue for NaiveDateTime {
    fn value_type() -> ValueType {
        ValueType::Long
    }

    fn to_scalar(&self, zone: &FixedOffset) -> Scalar {
        let seconds = self.and_utc().timestamp() - zone.local_minus_utc() as i64;
        Scalar::Number(Number::Long(seconds))
    }
}

impl IndexValue for DateTime<FixedOffset> {
    fn value_type() -> ValueType {
        ValueType::Long
    }

    fn to_scalar(&self, _zone: &FixedOffset) -> Scalar {
        Scalar::Number(Number::Long(self.timestamp()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn utc() -> FixedOffset {
        FixedOffset::east_opt(0).unwrap()
    }

    #[test]
    fn test_value_types() {
        assert_eq!(<String as IndexValue>::value_type(), ValueType::String);
        assert_eq!(<bool as IndexValue>::value_type(), ValueType::String);
        assert_eq!(<u32 as IndexValue>::value_type(), ValueType::Long);
        assert_eq!(<NaiveDate as IndexValue>::value_type(), ValueType::Long);
        assert_eq!(true.to_scalar(&utc()), Scalar::Str("true".into()));
        assert_eq!(7u32.to_scalar(&utc()), Scalar::Number(Number::Long(7)));
    }

    #[test]
    fn test_temporal_conversions() {
        let date = NaiveDate::from_ymd_opt(1970, 1, 11).unwrap();
        assert_eq!(date.to_scalar(&utc()), Scalar::Number(Number::Long(10)));

        let instant = Utc.timestamp_millis_opt(1_500).unwrap();
        assert_eq!(instant.to_scalar(&utc()), Scalar::Number(Number::Long(1_500)));

        let local = NaiveDate::from_ymd_opt(1970, 1, 1)
            .unwrap()
            .and_hms_opt(1, 0, 0)
            .unwrap();
        let plus_one = FixedOffset::east_opt(3600).unwrap();
        assert_eq!(local.to_scalar(&plus_one), Scalar::Number(Number::Long(0)));
        assert_eq!(local.to_scalar(&utc()), Scalar::Number(Number::Long(3600)));

        let offset = plus_one.from_local_datetime(&local).unwrap();
        assert_eq!(offset.to_scalar(&utc()), Scalar::Number(Number::Long(0)));
    }
}
