use std::fmt;

use veridiff_types::Value;

/// A lazy, single-pass source of elements.
///
/// Streams are consumed exactly once: validating from a stream moves it
/// into the comparison and it cannot be replayed.
pub struct ValueStream(Box<dyn Iterator<Item = Value>>);

impl ValueStream {
    pub fn new(iter: impl Iterator<Item = Value> + 'static) -> Self {
        Self(Box::new(iter))
    }

    pub fn from_values(values: Vec<Value>) -> Self {
        Self(Box::new(values.into_iter()))
    }
}

impl Iterator for ValueStream {
    type Item = Value;

    fn next(&mut self) -> Option<Value> {
        self.0.next()
    }
}

impl fmt::Debug for ValueStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ValueStream(..)")
    }
}

/// The data under test.
///
/// An `Element` is one atomic item; a `Collection` is a container of items
/// kept in its original shape (list, tuple, or set; the shape matters since
/// a set cannot be checked for sequence order); a `Stream` is a lazy
/// collection; a `Mapping` holds one entry of data per key.
#[derive(Debug)]
pub enum Data {
    Element(Value),
    /// Invariant: always a `List`, `Tuple`, or `Set` value.
    Collection(Value),
    Stream(ValueStream),
    Mapping(Vec<(Value, DataEntry)>),
}

/// One mapping entry's worth of data.
///
/// A nested map stays a single element here: entries are compared as
/// values, not re-entered as mappings.
#[derive(Debug)]
pub enum DataEntry {
    Element(Value),
    /// Invariant: always a `List`, `Tuple`, or `Set` value.
    Collection(Value),
    Stream(ValueStream),
}

impl DataEntry {
    pub fn from_value(value: Value) -> Self {
        match value {
            collection @ (Value::List(_) | Value::Tuple(_) | Value::Set(_)) => {
                Self::Collection(collection)
            }
            other => Self::Element(other),
        }
    }
}

impl From<Value> for Data {
    fn from(value: Value) -> Self {
        match value {
            collection @ (Value::List(_) | Value::Tuple(_) | Value::Set(_)) => {
                Self::Collection(collection)
            }
            Value::Map(pairs) => Self::Mapping(
                pairs
                    .into_iter()
                    .map(|(k, v)| (k, DataEntry::from_value(v)))
                    .collect(),
            ),
            other => Self::Element(other),
        }
    }
}

impl From<Vec<Value>> for Data {
    fn from(items: Vec<Value>) -> Self {
        Self::Collection(Value::List(items))
    }
}

impl From<ValueStream> for Data {
    fn from(stream: ValueStream) -> Self {
        Self::Stream(stream)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use veridiff_types::vals;

    #[test]
    fn value_conversion_follows_shape() {
        assert!(matches!(Data::from(Value::from(5)), Data::Element(_)));
        assert!(matches!(
            Data::from(Value::List(vals![1, 2])),
            Data::Collection(Value::List(_))
        ));
        assert!(matches!(
            Data::from(Value::Set(vals![1, 2])),
            Data::Collection(Value::Set(_))
        ));
        let map = Value::Map(vec![(Value::from("a"), Value::from(1))]);
        assert!(matches!(Data::from(map), Data::Mapping(_)));
    }

    #[test]
    fn nested_map_entry_stays_an_element() {
        let inner = Value::Map(vec![(Value::from("x"), Value::from(1))]);
        assert!(matches!(
            DataEntry::from_value(inner),
            DataEntry::Element(Value::Map(_))
        ));
        assert!(matches!(
            DataEntry::from_value(Value::Set(vals![1])),
            DataEntry::Collection(Value::Set(_))
        ));
    }

    #[test]
    fn stream_is_single_pass() {
        let mut stream = ValueStream::from_values(vals![1, 2]);
        assert_eq!(stream.next(), Some(Value::Int(1)));
        assert_eq!(stream.next(), Some(Value::Int(2)));
        assert_eq!(stream.next(), None);
    }
}
