use crate::{
    error::{DecodeError, PipelineError},
    preprocess::RawImage,
};
use std::{io, path::Path};

/// Reads and decodes an image file. A missing file is reported as
/// [`PipelineError::ImageUnavailable`], unreadable content as a decode error.
pub fn load_image(path: &Path) -> Result<RawImage, PipelineError> {
    let image_data = match std::fs::read(path) {
        Ok(data) => data,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            return Err(PipelineError::ImageUnavailable(path.to_path_buf()))
        }
        Err(e) => return Err(DecodeError::Io(e).into()),
    };

    Ok(RawImage::from_bytes(&image_data)?)
}
