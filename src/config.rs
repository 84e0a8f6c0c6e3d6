/*!

Runtime settings for an allocator. The process-wide allocator reads them once from the environment:

| variable             | meaning                                         | default      |
|:---------------------|:------------------------------------------------|:-------------|
| `ARC_SHOW_STATS`     | `report()` logs the operation counters          | off          |
| `ARC_TRACE`          | log every allocation and free at `trace`        | off          |
| `ARC_MAX_BLOCK_SIZE` | largest block `allocate` will request, in bytes | `isize::MAX` |

*/

use enumflags2::{bitflags, BitFlags};

use crate::error::ConfigError;

pub const SHOW_STATS_VAR    : &str = "ARC_SHOW_STATS";
pub const TRACE_VAR         : &str = "ARC_TRACE";
pub const MAX_BLOCK_SIZE_VAR: &str = "ARC_MAX_BLOCK_SIZE";

/// `Layout` refuses anything larger, and so does every heap worth using.
pub const DEFAULT_MAX_BLOCK_SIZE: usize = isize::MAX as usize;

#[bitflags]
#[repr(u8)]
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum RuntimeFlag {
  /// Report operation counters
  ShowStats,
  /// Log allocations and frees
  TraceOperations,
}

pub type RuntimeFlags = BitFlags<RuntimeFlag, u8>;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct RuntimeConfig {
  pub flags         : RuntimeFlags,
  pub max_block_size: usize,
}

impl Default for RuntimeConfig {
  fn default() -> Self {
    RuntimeConfig {
      flags         : RuntimeFlags::empty(),
      max_block_size: DEFAULT_MAX_BLOCK_SIZE,
    }
  }
}

impl RuntimeConfig {
  pub fn from_env() -> Result<RuntimeConfig, ConfigError> {
    RuntimeConfig::from_lookup(|key| std::env::var(key).ok())
  }

  /// Builds a config from whatever `lookup` returns for each variable. Unset variables keep their defaults.
  pub fn from_lookup<F>(lookup: F) -> Result<RuntimeConfig, ConfigError>
  where
    F: Fn(&str) -> Option<String>,
  {
    let mut config = RuntimeConfig::default();

    for (key, flag) in [(SHOW_STATS_VAR, RuntimeFlag::ShowStats), (TRACE_VAR, RuntimeFlag::TraceOperations)] {
      if let Some(value) = lookup(key) {
        if parse_bool(key, &value)? {
          config.flags.insert(flag);
        }
      }
    }

    if let Some(value) = lookup(MAX_BLOCK_SIZE_VAR) {
      config.max_block_size = value
          .trim()
          .parse::<usize>()
          .map_err(|_| ConfigError::invalid_number(MAX_BLOCK_SIZE_VAR, value.as_str()))?;
    }

    Ok(config)
  }

  #[inline(always)]
  pub fn with_flag(mut self, flag: RuntimeFlag) -> Self {
    self.flags.insert(flag);
    self
  }

  #[inline(always)]
  pub fn with_max_block_size(mut self, max_block_size: usize) -> Self {
    self.max_block_size = max_block_size;
    self
  }

  #[inline(always)]
  pub fn show_stats(&self) -> bool {
    self.flags.contains(RuntimeFlag::ShowStats)
  }

  #[inline(always)]
  pub fn trace_operations(&self) -> bool {
    self.flags.contains(RuntimeFlag::TraceOperations)
  }
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
  match value.trim().to_ascii_lowercase().as_str() {
    "1" | "true" | "yes" | "on"  => Ok(true),
    "0" | "false" | "no" | "off" | "" => Ok(false),
    _ => Err(ConfigError::invalid_flag(key, value)),
  }
}
