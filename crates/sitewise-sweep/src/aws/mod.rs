//! AWS client modules
//!
//! - context: shared SDK configuration
//! - error: SiteWise error code classification
//! - sitewise: [`ResourceApi`](crate::api::ResourceApi) over the IoT SiteWise SDK

pub mod context;
pub mod error;
pub mod sitewise;

pub use context::{AwsContext, FromAwsContext};
pub use error::{classify_sitewise_error, from_sdk_error};
pub use sitewise::SiteWiseClient;
