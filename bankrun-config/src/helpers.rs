use std::str::FromStr;

use serde::{Deserialize, Serialize};
use solana_sdk::pubkey::Pubkey;

pub(crate) fn option_pubkey_deserialize<'de, D>(
    deserializer: D,
) -> Result<Option<Pubkey>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s = Option::<String>::deserialize(deserializer)?;
    s.map(|s| Pubkey::from_str(&s).map_err(serde::de::Error::custom))
        .transpose()
}

pub(crate) fn option_pubkey_serialize<S>(
    key: &Option<Pubkey>,
    serializer: S,
) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    key.map(|key| key.to_string()).serialize(serializer)
}
