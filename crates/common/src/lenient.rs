use serde::{Deserialize, Deserializer};

// Catalog services are inconsistent about numeric fields: some send numbers,
// some send strings, some send garbage. Anything unusable decodes to None.
#[derive(Deserialize)]
#[serde(untagged)]
enum Loose {
    Unsigned(u64),
    Signed(i64),
    Float(f64),
    Text(String),
}

impl Loose {
    fn into_u64(self) -> Option<u64> {
        match self {
            Loose::Unsigned(value) => Some(value),
            Loose::Signed(_) => None,
            Loose::Float(value) if value >= 0.0 && value.fract() == 0.0 => Some(value as u64),
            Loose::Float(_) => None,
            Loose::Text(text) => text.trim().parse().ok(),
        }
    }
}

pub fn opt_u64<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value: Option<Loose> = Option::deserialize(deserializer)?;
    Ok(value.and_then(Loose::into_u64))
}

pub fn opt_u32<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(opt_u64(deserializer)?.and_then(|value| u32::try_from(value).ok()))
}

pub fn opt_u16<'de, D>(deserializer: D) -> Result<Option<u16>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(opt_u64(deserializer)?.and_then(|value| u16::try_from(value).ok()))
}
