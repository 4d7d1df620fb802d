//! Content upload requests

use futures::stream;
use http::header::{HeaderName, CONTENT_LENGTH, CONTENT_TYPE};
use reqwest::{Body, Method};
use tracing::debug;

use crate::deploy::api::FileUpload;
use crate::errors::ClientError;
use crate::http::client::HttpClient;

/// Header carrying the content hash of an upload
pub const CONTENT_DIGEST: HeaderName = HeaderName::from_static("x-content-digest");

/// Size of the body chunks; the progress counter advances per chunk
pub const UPLOAD_CHUNK_SIZE: usize = 64 * 1024;

impl HttpClient {
    /// Upload one content, counting bytes as the transport consumes them
    pub async fn post_file(&self, upload: FileUpload) -> Result<(), ClientError> {
        let size = upload.data.len();
        let chunks: Vec<Vec<u8>> = upload
            .data
            .chunks(UPLOAD_CHUNK_SIZE)
            .map(<[u8]>::to_vec)
            .collect();
        let counter = upload.progress.clone();
        let body = Body::wrap_stream(stream::iter(chunks.into_iter().map(move |chunk| {
            counter.add(chunk.len() as u64);
            Ok::<_, std::io::Error>(chunk)
        })));

        let request = self
            .request(Method::POST, "/v2/files")?
            .header(CONTENT_DIGEST, upload.hash.as_str())
            .header(CONTENT_LENGTH, size)
            .header(CONTENT_TYPE, "application/octet-stream")
            .body(body);
        self.send(request).await?;

        debug!(hash = %upload.hash, size, "Upload accepted");
        Ok(())
    }
}
