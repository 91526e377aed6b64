//! Streams multipart image fields into staged files.

use axum::extract::Multipart;
use tracing::debug;
use washout_llm::StagedImage;

use crate::config::UploadLimits;
use crate::error::{CheckError, CheckResult, NO_IMAGE_MESSAGE};

/// Multipart field carrying an image.
pub const IMAGE_FIELD: &str = "image";

/// Stage every `image` field of the request.
///
/// Other fields are ignored, as are empty file inputs. Each image is written
/// to disk chunk by chunk and rejected as soon as it passes the size limit;
/// anything already staged is removed when the error drops it.
pub async fn stage_images(
    mut multipart: Multipart,
    limits: &UploadLimits,
) -> CheckResult<Vec<StagedImage>> {
    let mut images = Vec::new();

    while let Some(mut field) = multipart
        .next_field()
        .await
        .map_err(|e| CheckError::input(format!("不正なアップロードです: {e}")))?
    {
        if field.name() != Some(IMAGE_FIELD) {
            continue;
        }
        if images.len() >= limits.max_images_per_request {
            return Err(CheckError::input(format!(
                "画像は{}枚までアップロードできます",
                limits.max_images_per_request
            )));
        }

        let mut staged = StagedImage::create_in(&limits.staging_dir)
            .map_err(|e| CheckError::Internal(format!("could not stage upload: {e}")))?;

        while let Some(chunk) = field
            .chunk()
            .await
            .map_err(|e| CheckError::input(format!("不正なアップロードです: {e}")))?
        {
            if staged.len() + chunk.len() > limits.max_image_bytes {
                return Err(CheckError::input(format!(
                    "画像サイズは{}バイト以下にしてください",
                    limits.max_image_bytes
                )));
            }
            staged
                .write_chunk(&chunk)
                .map_err(|e| CheckError::Internal(format!("could not stage upload: {e}")))?;
        }

        if staged.is_empty() {
            staged.discard();
            continue;
        }
        debug!(size = staged.len(), "Staged uploaded image");
        images.push(staged);
    }

    if images.is_empty() {
        return Err(CheckError::input(NO_IMAGE_MESSAGE));
    }
    Ok(images)
}
