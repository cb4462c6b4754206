//! File browsing under the data folder.
//!
//! Lists recognised image containers and readable subdirectories, honouring
//! the access policy. Only basic file information is produced here; header
//! extraction belongs to the container readers.

use std::path::Path;

use tracing::debug;

use crate::image::{detect_format, CubeFormat};
use crate::proto::{FileInfo, FileInfoRequest, FileInfoResponse, FileListResponse, FileType};
use crate::server::policy::AccessPolicy;

fn file_type_of(format: CubeFormat) -> FileType {
    match format {
        CubeFormat::Fits => FileType::Fits,
        CubeFormat::Hdf5 => FileType::Hdf5,
        CubeFormat::Paged => FileType::Casa,
        CubeFormat::Miriad => FileType::Miriad,
        CubeFormat::Unknown => FileType::Unknown,
    }
}

fn failure(directory: &str, message: &str) -> FileListResponse {
    FileListResponse {
        success: false,
        message: message.to_string(),
        directory: directory.to_string(),
        ..Default::default()
    }
}

/// Build the `FILE_LIST_RESPONSE` for one directory.
pub fn file_list(
    base: &Path,
    directory: &str,
    policy: &dyn AccessPolicy,
    api_key: &str,
) -> FileListResponse {
    if !policy.is_directory_readable(directory, api_key) {
        return failure(directory, "Cannot read directory; check name and permissions.");
    }

    let relative = directory.trim_matches('/');
    let full = if relative.is_empty() {
        base.to_path_buf()
    } else {
        base.join(relative)
    };
    if !full.is_dir() {
        return failure(directory, "Cannot read directory; check name and permissions.");
    }

    let entries = match std::fs::read_dir(&full) {
        Ok(entries) => entries,
        Err(err) => {
            debug!(directory, error = %err, "directory listing failed");
            return failure(directory, &err.to_string());
        }
    };

    let mut response = FileListResponse {
        success: true,
        directory: relative.to_string(),
        parent: match relative.rfind('/') {
            Some(idx) => relative[..idx].to_string(),
            None => String::new(),
        },
        ..Default::default()
    };

    for entry in entries.flatten() {
        let path = entry.path();
        let Some(name) = path.file_name().and_then(|n| n.to_str()).map(String::from) else {
            continue;
        };
        let format = detect_format(&path);

        if path.is_dir() && format == CubeFormat::Unknown {
            let sub_prefix = if relative.is_empty() {
                name.clone()
            } else {
                format!("{relative}/{name}")
            };
            if policy.is_directory_readable(&sub_prefix, api_key) {
                response.subdirectories.push(name);
            }
            continue;
        }

        if format != CubeFormat::Unknown {
            let size = entry.metadata().map(|m| m.len() as i64).unwrap_or(0);
            response.files.push(FileInfo {
                name,
                r#type: file_type_of(format) as i32,
                size,
                hdu_list: vec![String::new()],
            });
        }
    }
    response.files.sort_by(|a, b| a.name.cmp(&b.name));
    response.subdirectories.sort();
    response
}

/// Build the `FILE_INFO_RESPONSE` for one entry.
pub fn file_info(
    base: &Path,
    request: &FileInfoRequest,
    policy: &dyn AccessPolicy,
    api_key: &str,
) -> FileInfoResponse {
    let entry = if request.directory.is_empty() {
        request.file.clone()
    } else {
        format!("{}/{}", request.directory.trim_matches('/'), request.file)
    };
    if !policy.is_entry_readable(&entry, api_key) {
        return FileInfoResponse {
            success: false,
            message: "Permission denied".into(),
            file_info: None,
        };
    }

    let path = base.join(entry.trim_start_matches('/'));
    if !path.exists() {
        return FileInfoResponse {
            success: false,
            message: format!("{} not found", request.file),
            file_info: None,
        };
    }

    let size = std::fs::metadata(&path).map(|m| m.len() as i64).unwrap_or(0);
    FileInfoResponse {
        success: true,
        message: String::new(),
        file_info: Some(FileInfo {
            name: request.file.clone(),
            r#type: file_type_of(detect_format(&path)) as i32,
            size,
            hdu_list: vec![request.hdu.clone()],
        }),
    }
}

// =============================================================================
// Tests
// =============================================================================
