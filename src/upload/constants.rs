//! Constants for the upload module (wire defaults, timeouts, fallback texts).

/// Multipart field name carrying the payload.
pub const FILE_FIELD_NAME: &str = "file";

/// Default HTTP method for transfers.
pub const DEFAULT_METHOD: &str = "POST";

/// Marker header identifying asynchronous requests to the server.
pub const AJAX_MARKER_HEADER: &str = "x-requested-with";

/// Value of the ajax marker header.
pub const AJAX_MARKER_VALUE: &str = "XMLHttpRequest";

/// Response text used when the server gave nothing usable.
pub const INVALID_RESPONSE_TEXT: &str = "Invalid response from server";

/// Response text for transfers attempted without native file access.
pub const FILE_API_UNAVAILABLE_TEXT: &str = "File API is not available";

/// Response text for files started without any transfer executor.
pub const NO_EXECUTOR_TEXT: &str = "No transfer configured for this file";

/// The only HTTP status treated as a successful upload.
pub const SUCCESS_STATUS: u16 = 200;

/// Default HTTP connect timeout (30 seconds).
pub const CONNECT_TIMEOUT_SECS: u64 = 30;

/// Default HTTP request timeout (30 minutes for large payloads).
pub const REQUEST_TIMEOUT_SECS: u64 = 1800;

/// Chunk size used when streaming payloads into the request body.
pub const STREAM_CHUNK_SIZE: usize = 64 * 1024;
