use crate::{Flow, Reactive};
use ::serde::{Deserialize, Deserializer, Serialize, Serializer};

impl<T: Serialize> Serialize for Reactive<T> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.with_value(|value| value.serialize(serializer))
    }
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for Reactive<T> {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        T::deserialize(deserializer).map(Reactive::new)
    }
}

impl<T: Serialize> Serialize for Flow<T> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.with_value(|value| value.serialize(serializer))
    }
}
