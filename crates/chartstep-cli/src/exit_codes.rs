//! Standard exit codes for the step
//!
//! These exit codes follow Unix conventions and sysexits.h where applicable.

/// Success - the step completed without errors
pub const SUCCESS: i32 = 0;

/// General error - unspecified failure
pub const ERROR: i32 = 1;

/// Configuration error - invalid step configuration or no values file
pub const CONFIG_ERROR: i32 = 2;

/// Template error - a values file failed to render in strict mode
pub const TEMPLATE_ERROR: i32 = 3;

/// Chart error - unreadable or incomplete Chart.yaml
pub const CHART_ERROR: i32 = 4;

/// IO error - file not found, permission denied, etc.
pub const IO_ERROR: i32 = 5;

/// Operation error - a helm operation failed
pub const OPERATION_ERROR: i32 = 6;

/// Usage error - invalid arguments or options (following sysexits.h convention)
pub const USAGE_ERROR: i32 = 64;
