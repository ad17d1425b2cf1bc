pub mod backend;
pub mod suffix;
pub mod url;

pub use backend::{
    BackendCapabilities, BackendDescriptor, BackendRegistry, FetchBackend, FetchError,
    FetchOptions, FetchResponse,
};
pub use suffix::DomainParts;
pub use url::{RejectReason, UrlDescriptor, UrlKind, UrlPolicy, UrlRejection, UrlResolver};
