#![allow(dead_code, unused_imports)]

pub use procpipe_test_utils::builders::{PipelineConfigBuilder, StageConfigBuilder};
pub use procpipe_test_utils::payload::{MIB, binary_payload, text_payload};
pub use procpipe_test_utils::sinks::FailingSink;
pub use procpipe_test_utils::{init_tracing, with_timeout};
