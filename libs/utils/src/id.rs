//! Opaque 128-bit identifiers, rendered as lowercase hex.
//!
//! Extents need an id that is globally unique without any coordination
//! between writers: a random 128-bit value is sufficient (spec.md §3).

use std::fmt;
use std::str::FromStr;

use rand::RngCore;
use serde::{Deserialize, Serialize};

#[derive(thiserror::Error, Debug)]
#[error("invalid id: {0}")]
pub struct ParseIdError(String);

macro_rules! generate_id_type {
    ($name:ident) => {
        #[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub struct $name([u8; 16]);

        impl $name {
            pub fn generate() -> Self {
                let mut buf = [0u8; 16];
                rand::thread_rng().fill_bytes(&mut buf);
                Self(buf)
            }

            pub fn as_bytes(&self) -> &[u8; 16] {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                for b in &self.0 {
                    write!(f, "{b:02x}")?;
                }
                Ok(())
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self)
            }
        }

        impl FromStr for $name {
            type Err = ParseIdError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                if s.len() != 32 {
                    return Err(ParseIdError(s.to_string()));
                }
                let mut buf = [0u8; 16];
                for (i, chunk) in buf.iter_mut().enumerate() {
                    let byte_str = s
                        .get(i * 2..i * 2 + 2)
                        .ok_or_else(|| ParseIdError(s.to_string()))?;
                    *chunk = u8::from_str_radix(byte_str, 16)
                        .map_err(|_| ParseIdError(s.to_string()))?;
                }
                Ok(Self(buf))
            }
        }
    };
}

generate_id_type!(ExtentId);
