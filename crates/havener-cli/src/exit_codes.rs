//! Standard exit codes for CLI operations
//!
//! These exit codes follow Unix conventions and sysexits.h where applicable.

/// Success - operation completed without errors
#[allow(dead_code)]
pub const SUCCESS: i32 = 0;

/// General error - unspecified failure
pub const ERROR: i32 = 1;

/// Configuration error - configuration file missing or malformed
pub const CONFIG_ERROR: i32 = 2;

/// Template error - a shell operator failed
pub const TEMPLATE_ERROR: i32 = 3;

/// Cluster error - a hook, Helm or Kubernetes operation failed
pub const CLUSTER_ERROR: i32 = 4;

/// IO error - terminal or file access failed
pub const IO_ERROR: i32 = 5;
