//! Asset identity: request parsing, key derivation and file naming.

pub mod key;
pub mod request;
pub mod template;

// Types
pub use key::{AssetKey, OptionsDigest, namespace};
pub use request::{
    EncoderOptions, InlineEncoding, OutputMode, RequestPlan, TargetWidth, TransformRequest,
    is_transform_key,
};
pub use template::{FileParts, FilenameTemplate};
