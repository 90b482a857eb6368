pub mod browser;
pub mod deadline;
pub mod html;
pub mod http;
pub mod traits;
pub mod types;

pub use browser::BrowserProvider;
pub use html::CardSelectors;
pub use http::HttpProvider;
pub use traits::PageSnapshotProvider;
