//! Terminal output for the CLI
//!
//! Uses `cliclack` for styled output in interactive terminals, with a
//! plain `[OK]` / `[WARN]` fallback in CI and when output is piped.

mod context;
mod output;
mod progress;

pub use context::UiContext;
pub use output::{
    intro, key_value, key_value_status, outro_success, outro_warn, remark, section,
    step_error_detail, step_info, step_ok, step_ok_detail, step_warn, step_warn_hint,
};
pub use progress::TaskSpinner;
