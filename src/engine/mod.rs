pub mod assets;
pub mod input;
pub mod orchestrator;
pub mod record;
pub mod resolver;
pub mod retry;
pub mod select;
pub mod status;
pub mod upload;

pub use assets::{AcquisitionTechnique, Asset, AssetFailure, AssetFetcher, AssetResult};
pub use input::{FillOptions, InputSimulator};
pub use orchestrator::{FillState, FormFiller, Outcome, RunOutcome};
pub use record::{FieldRecord, FieldValue, ImageList};
pub use resolver::{ElementResolver, Position, ResolutionQuery};
pub use retry::{with_retry, RetryPolicy};
pub use select::{OptionSelector, SelectOptions, Selection};
pub use status::{LogReporter, Severity, StatusReporter};
pub use upload::{UploadBinder, UploadOptions, UploadOutcome};
