//! Acquisition: fetching remote bytes, unpacking KMZ archives, and loading
//! local or remote sources into parsed documents.

pub mod archive;
pub mod http_client;
pub mod source;
