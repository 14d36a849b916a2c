mod matcher;
mod service_url;

pub use matcher::*;
pub use service_url::*;
