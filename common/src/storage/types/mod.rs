use serde::{
    de::{self, Visitor},
    Deserialize, Deserializer, Serialize,
};
use std::fmt;
use surrealdb::sql::Thing;

pub mod contact;
pub mod department;
pub mod site;

pub trait StoredObject: Serialize + for<'de> Deserialize<'de> {
    fn table_name() -> &'static str;
    fn get_id(&self) -> i64;
    /// Column names in serialization order, used as CSV header.
    fn columns() -> &'static [&'static str];
}

/// Only the key of a record, for queries selecting `id` alone.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct RecordKey {
    #[serde(deserialize_with = "deserialize_record_id")]
    pub id: i64,
}

struct RecordIdVisitor;

impl<'de> Visitor<'de> for RecordIdVisitor {
    type Value = i64;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("an integer, a `table:id` string or a Thing")
    }

    fn visit_i64<E>(self, value: i64) -> Result<Self::Value, E>
    where
        E: de::Error,
    {
        Ok(value)
    }

    fn visit_u64<E>(self, value: u64) -> Result<Self::Value, E>
    where
        E: de::Error,
    {
        i64::try_from(value).map_err(|_| E::custom(format!("record id {value} out of range")))
    }

    fn visit_str<E>(self, value: &str) -> Result<Self::Value, E>
    where
        E: de::Error,
    {
        parse_record_key(value).map_err(E::custom)
    }

    fn visit_map<A>(self, map: A) -> Result<Self::Value, A::Error>
    where
        A: de::MapAccess<'de>,
    {
        let thing = Thing::deserialize(de::value::MapAccessDeserializer::new(map))?;
        parse_record_key(&thing.id.to_raw()).map_err(de::Error::custom)
    }
}

fn parse_record_key(raw: &str) -> Result<i64, String> {
    let key = raw.rsplit(':').next().unwrap_or(raw).trim();
    key.parse::<i64>()
        .map_err(|_| format!("record id `{raw}` is not numeric"))
}

/// Accepts the integer key of a record however SurrealDB hands it back.
pub fn deserialize_record_id<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    deserializer.deserialize_any(RecordIdVisitor)
}

/// Reads a nullable text column as a plain string, NULL becoming empty.
pub fn deserialize_null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

/// Declares a record type keyed by an integer id. The generated struct has
/// `id` as its first column followed by the given fields in order.
#[macro_export]
macro_rules! stored_object {
    ($name:ident, $table:expr, {$($(#[$attr:meta])* $field:ident: $ty:ty),*}) => {
        #[allow(unused_imports)]
        use $crate::storage::types::{deserialize_record_id, StoredObject};

        #[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq)]
        pub struct $name {
            #[serde(deserialize_with = "deserialize_record_id")]
            pub id: i64,
            $( $(#[$attr])* pub $field: $ty),*
        }

        impl StoredObject for $name {
            fn table_name() -> &'static str {
                $table
            }

            fn get_id(&self) -> i64 {
                self.id
            }

            fn columns() -> &'static [&'static str] {
                &["id", $(stringify!($field)),*]
            }
        }
    };
}
