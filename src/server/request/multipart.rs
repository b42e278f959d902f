//! Multipart form data parsing.

use std::path::Path;

use bytes::Bytes;
use futures_util::stream;
use multer::Multipart;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

use crate::types::{UploadedFile, UploadedFiles, UPLOAD_ERR_OK, UPLOAD_ERR_SIZE};

/// Maximum size of a single uploaded file (10 MB).
pub const MAX_UPLOAD_SIZE: u64 = 10 * 1024 * 1024;

/// Text fields and files of a `multipart/form-data` body.
#[derive(Debug, Default)]
pub struct MultipartData {
    pub fields: Vec<(String, String)>,
    pub files: UploadedFiles,
}

impl MultipartData {
    /// Temp files written for this body.
    pub fn temp_paths(&self) -> impl Iterator<Item = &Path> {
        self.files
            .values()
            .flatten()
            .filter(|f| f.is_ok())
            .map(|f| f.tmp_path.as_path())
    }
}

/// Parse multipart form data, writing file parts under `upload_dir`.
///
/// Parts larger than `max_file_size` are reported with
/// [`UPLOAD_ERR_SIZE`] and no temp file.
pub async fn parse_multipart(
    content_type: &str,
    body: Bytes,
    upload_dir: &Path,
    max_file_size: u64,
) -> Result<MultipartData, String> {
    tracing::debug!(
        content_type = content_type,
        body_len = body.len(),
        "parse_multipart: starting"
    );

    let boundary = multer::parse_boundary(content_type).map_err(|e| e.to_string())?;

    let mut multipart = Multipart::new(
        stream::once(async { Ok::<_, std::io::Error>(body) }),
        boundary,
    );

    let mut data = MultipartData::default();

    if let Err(e) = read_parts(&mut multipart, &mut data, upload_dir, max_file_size).await {
        // Files written before the failure belong to no request
        for path in data.temp_paths() {
            let _ = std::fs::remove_file(path);
        }
        return Err(e);
    }

    tracing::debug!(
        fields_count = data.fields.len(),
        files_count = data.files.len(),
        "parse_multipart: completed"
    );

    Ok(data)
}

async fn read_parts(
    multipart: &mut Multipart<'_>,
    data: &mut MultipartData,
    upload_dir: &Path,
    max_file_size: u64,
) -> Result<(), String> {
    while let Some(field) = multipart.next_field().await.map_err(|e| e.to_string())? {
        let field_name = field.name().unwrap_or("").to_string();
        let file_name = field.file_name().map(str::to_string);
        let media_type = field
            .content_type()
            .map(|m| m.to_string())
            .unwrap_or_default();

        let Some(client_filename) = file_name else {
            let value = field.text().await.map_err(|e| e.to_string())?;
            tracing::debug!(
                field_name = %field_name,
                value_len = value.len(),
                "parse_multipart: parsed form field"
            );
            data.fields.push((field_name, value));
            continue;
        };

        if client_filename.is_empty() {
            continue;
        }

        let bytes = field.bytes().await.map_err(|e| e.to_string())?;
        let size = bytes.len() as u64;

        let normalized_name = field_name
            .strip_suffix("[]")
            .unwrap_or(&field_name)
            .to_string();

        let uploaded = if size > max_file_size {
            UploadedFile {
                tmp_path: Default::default(),
                client_filename,
                client_media_type: media_type,
                size,
                error: UPLOAD_ERR_SIZE,
            }
        } else {
            let tmp_path = upload_dir.join(format!("workhall{}", Uuid::new_v4().simple()));

            if let Err(e) = write_temp_file(&tmp_path, &bytes).await {
                let _ = tokio::fs::remove_file(&tmp_path).await;
                return Err(e.to_string());
            }

            UploadedFile {
                tmp_path,
                client_filename,
                client_media_type: media_type,
                size,
                error: UPLOAD_ERR_OK,
            }
        };

        tracing::debug!(
            field_name = %normalized_name,
            file_name = %uploaded.client_filename,
            tmp_path = %uploaded.tmp_path.display(),
            size = uploaded.size,
            error = uploaded.error,
            "parse_multipart: parsed uploaded file"
        );

        data.files.entry(normalized_name).or_default().push(uploaded);
    }

    Ok(())
}

async fn write_temp_file(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut file = File::create(path).await?;
    file.write_all(bytes).await?;
    file.flush().await
}
