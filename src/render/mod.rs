//! Human-facing renderings of planner output.

pub mod html;

pub use html::render_log_html;
