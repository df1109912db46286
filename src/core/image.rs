use crate::utils::error::{CrewError, Result};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use std::path::Path;

pub const JPEG_DATA_URL_PREFIX: &str = "data:image/jpeg;base64,";

pub fn encode_bytes(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

/// 讀取圖片並轉為 base64 文字，超過 `max_bytes` 或空檔案會被拒絕
pub fn encode_image_with_limit(path: &Path, max_bytes: u64) -> Result<String> {
    if path.as_os_str().is_empty() {
        return Err(CrewError::ValidationError {
            message: "Image path cannot be empty".to_string(),
        });
    }

    let size = std::fs::metadata(path)?.len();
    if size == 0 {
        return Err(CrewError::ValidationError {
            message: format!("Image file is empty: {}", path.display()),
        });
    }
    if size > max_bytes {
        return Err(CrewError::ValidationError {
            message: format!(
                "Image file {} is {} bytes, limit is {} bytes",
                path.display(),
                size,
                max_bytes
            ),
        });
    }

    let bytes = std::fs::read(path)?;
    tracing::debug!("Encoded {} ({} bytes)", path.display(), bytes.len());
    Ok(encode_bytes(&bytes))
}

pub fn encode_image(path: &Path) -> Result<String> {
    encode_image_with_limit(path, u64::MAX)
}

pub fn image_data_url(base64_image: &str) -> String {
    format!("{}{}", JPEG_DATA_URL_PREFIX, base64_image)
}
