pub mod automation;
pub mod chrome;
pub mod overlay;

pub use automation::CdpDocument;
pub use overlay::OverlayReporter;
