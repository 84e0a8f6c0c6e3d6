use thiserror::Error;

/// Why a block could not be allocated. At the C boundary every variant collapses to a null handle.
#[derive(Error, Debug, Clone, Copy, Eq, PartialEq)]
pub enum AllocError {
  #[error("block of {size} bytes cannot hold the {minimum} byte reference count")]
  TooSmall { size: usize, minimum: usize },

  #[error("block of {size} bytes exceeds the {maximum} byte limit")]
  TooLarge { size: usize, maximum: usize },

  #[error("heap exhausted allocating {size} bytes")]
  OutOfMemory { size: usize },
}

#[derive(Error, Debug, Clone, Eq, PartialEq)]
pub enum ConfigError {
  #[error("{key} = {value:?} is not a byte count")]
  InvalidNumber { key: String, value: String },

  #[error("{key} = {value:?} is not a boolean")]
  InvalidFlag { key: String, value: String },
}

impl ConfigError {
  #[cold]
  pub fn invalid_number<K: Into<String>, V: Into<String>>(key: K, value: V) -> Self {
    ConfigError::InvalidNumber {
      key  : key.into(),
      value: value.into(),
    }
  }

  #[cold]
  pub fn invalid_flag<K: Into<String>, V: Into<String>>(key: K, value: V) -> Self {
    ConfigError::InvalidFlag {
      key  : key.into(),
      value: value.into(),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn messages_name_the_problem() {
    assert_eq!(
      AllocError::TooSmall { size: 3, minimum: 8 }.to_string(),
      "block of 3 bytes cannot hold the 8 byte reference count"
    );
    assert_eq!(
      ConfigError::invalid_number("ARC_MAX_BLOCK_SIZE", "lots").to_string(),
      "ARC_MAX_BLOCK_SIZE = \"lots\" is not a byte count"
    );
  }
}
